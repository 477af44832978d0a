use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) and a JSON summary to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stampede",
    author,
    version,
    about = "Staged-load HTTP testing engine",
    long_about = "stampede drives a staged population of virtual users against an HTTP target.\n\nEach virtual user runs the configured test cases in order, then a `load` and a `stress` probe, then sleeps for the think time. Every response is checked and all results are aggregated into a report.",
    after_help = "Examples:\n  stampede run configs/fakestore.yaml\n  stampede run configs/fakestore.yaml --base-url http://127.0.0.1:8080\n  stampede run configs/fakestore.yaml --output json --html report.html\n  stampede validate configs/fakestore.yaml"
)]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a staged load test
    #[command(
        long_about = "Load a YAML run file, ramp virtual users through its stages and report the results.\n\nCLI flags override values from the file."
    )]
    Run(RunArgs),

    /// Check a run file without sending any traffic
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the run file (.yaml)
    pub config: PathBuf,

    /// Override `baseUrl` from the run file
    #[arg(long, env = "STAMPEDE_BASE_URL")]
    pub base_url: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Write an HTML report to this path (relative to the working directory)
    #[arg(long, value_name = "PATH")]
    pub html: Option<String>,

    /// Write the JSON summary to this path (relative to the working directory)
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<String>,

    /// Disable live progress output
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Path to the run file (.yaml)
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_reports() {
        let parsed = Cli::try_parse_from([
            "stampede",
            "-vv",
            "run",
            "fakestore.yaml",
            "--base-url",
            "http://127.0.0.1:8080",
            "--output",
            "json",
            "--html",
            "out/report.html",
            "--summary-json",
            "summary.json",
            "--no-progress",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.config, PathBuf::from("fakestore.yaml"));
                assert_eq!(args.base_url.as_deref(), Some("http://127.0.0.1:8080"));
                assert_eq!(args.output, OutputFormat::Json);
                assert_eq!(args.html.as_deref(), Some("out/report.html"));
                assert_eq!(args.summary_json.as_deref(), Some("summary.json"));
                assert!(args.no_progress);
            }
            Command::Validate(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_run_defaults() {
        let cli = match Cli::try_parse_from(["stampede", "run", "x.yaml"]) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.output, OutputFormat::HumanReadable);
                assert!(args.html.is_none());
                assert!(args.summary_json.is_none());
                assert!(!args.no_progress);
            }
            Command::Validate(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_validate() {
        let cli = match Cli::try_parse_from(["stampede", "validate", "x.yaml"]) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        assert!(matches!(cli.command, Command::Validate(a) if a.config == PathBuf::from("x.yaml")));
    }

    #[test]
    fn cli_rejects_unknown_output_format() {
        assert!(Cli::try_parse_from(["stampede", "run", "x.yaml", "--output", "xml"]).is_err());
    }
}
