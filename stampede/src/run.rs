use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use stampede_core::HttpClient;
use stampede_core::runner::{
    BoxError, FinalizeFn, RenderedOutput, RunConfig, RunOptions, RunSummary, validate_output_paths,
};
use tokio_util::sync::CancellationToken;

use crate::cli::{RunArgs, ValidateArgs};
use crate::config_yaml;
use crate::exit_codes::ExitCode;
use crate::output::{self, OutputFormatter};
use crate::output::html::{ReportContext, render_report};
use crate::output::json::summary_json;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let cfg = load_config(&args.config, args.base_url.as_deref()).await?;

    let report_files = requested_report_files(&args);
    validate_output_paths(&report_files)?;

    let out = output::formatter(args.output);
    out.print_header(&args.config, &cfg);

    let shutdown = CancellationToken::new();
    let interrupt = spawn_interrupt_watcher(shutdown.clone());

    let mut options = RunOptions::default().with_shutdown(shutdown);
    options.finalize = Some(finalizer(&args, &cfg, out.clone()));
    if !args.no_progress
        && let Some(progress) = out.progress()
    {
        options = options.with_progress(progress);
    }

    let executor = Arc::new(HttpClient::default());
    let result = stampede_core::runner::run(cfg, executor, options).await;

    interrupt.abort();
    out.finish();
    let report = result?;

    if let Some(text) = &report.rendered.stdout {
        print!("{text}");
    }
    for (path, _) in &report.rendered.files {
        tracing::info!(%path, "report written");
    }

    Ok(ExitCode::from_checks(report.summary.checks_failed_total()))
}

pub async fn validate(args: ValidateArgs) -> Result<ExitCode, RunError> {
    let cfg = load_config(&args.config, None).await?;
    println!(
        "{}: ok ({} tests, {} stages, {} total, peak {} virtual users)",
        args.config.display(),
        cfg.tests.len(),
        cfg.stages.len(),
        humantime::format_duration(cfg.total_duration()),
        cfg.max_target()
    );
    Ok(ExitCode::Success)
}

async fn load_config(path: &Path, base_url: Option<&str>) -> Result<RunConfig, RunError> {
    let mut cfg = config_yaml::load_run_config(path)
        .await
        .map_err(RunError::InvalidInput)?;
    if let Some(url) = base_url {
        cfg.base_url = url.to_string();
    }
    cfg.validate()
        .with_context(|| format!("invalid config: {}", path.display()))
        .map_err(RunError::InvalidInput)?;
    Ok(cfg)
}

/// Paths only; contents are filled in once the run is over.
fn requested_report_files(args: &RunArgs) -> Vec<(String, String)> {
    args.html
        .iter()
        .chain(args.summary_json.iter())
        .map(|p| (p.clone(), String::new()))
        .collect()
}

fn finalizer(args: &RunArgs, cfg: &RunConfig, out: Arc<dyn OutputFormatter>) -> FinalizeFn {
    let html = args.html.clone();
    let summary_path = args.summary_json.clone();
    let ctx = ReportContext::new(config_title(&args.config), cfg);

    Box::new(move |summary: &RunSummary| -> Result<RenderedOutput, BoxError> {
        let mut rendered = RenderedOutput {
            stdout: Some(out.render_summary(summary)?),
            files: Vec::new(),
        };
        if let Some(path) = html {
            rendered.files.push((path, render_report(&ctx, summary)?));
        }
        if let Some(path) = summary_path {
            rendered.files.push((path, summary_json(summary, true)?));
        }
        Ok(rendered)
    })
}

fn config_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// First Ctrl-C drains the ramp early; the run still reports what it collected.
fn spawn_interrupt_watcher(shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping virtual users");
            shutdown.cancel();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("configs/fakestore.yaml"),
            base_url: None,
            output: OutputFormat::HumanReadable,
            html: Some("out/report.html".to_string()),
            summary_json: Some("summary.json".to_string()),
            no_progress: true,
        }
    }

    #[test]
    fn report_files_follow_the_flags() {
        let files = requested_report_files(&args());
        let paths: Vec<_> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["out/report.html", "summary.json"]);
    }

    #[test]
    fn config_title_is_the_file_name() {
        assert_eq!(config_title(Path::new("configs/fakestore.yaml")), "fakestore.yaml");
    }

    #[test]
    fn finalizer_renders_stdout_and_both_files() {
        let a = args();
        let cfg = RunConfig::new("http://localhost", Vec::new(), Vec::new());
        let finalize = finalizer(&a, &cfg, output::formatter(OutputFormat::Json));

        let rendered = finalize(&RunSummary::default())
            .unwrap_or_else(|e| panic!("finalize: {e}"));

        assert!(
            rendered
                .stdout
                .as_deref()
                .is_some_and(|s| s.contains("\"kind\":\"summary\""))
        );
        assert_eq!(rendered.files.len(), 2);
        assert!(rendered.files[0].1.contains("<!DOCTYPE html>"));
        assert!(rendered.files[1].1.contains("\"total_requests\": 0"));
    }

    #[tokio::test]
    async fn missing_config_is_invalid_input() {
        let err = load_config(Path::new("does/not/exist.yaml"), None).await;
        assert!(matches!(err, Err(RunError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn base_url_override_is_validated() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.yaml");
        std::fs::write(
            &path,
            "baseUrl: http://localhost:8080\ntests: [{ name: a, url: /products, expect: 200 }]\nstages: [{ duration: 1, target: 1 }]\n",
        )?;

        let cfg = load_config(&path, Some("http://127.0.0.1:9"))
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(cfg.base_url, "http://127.0.0.1:9");

        let err = load_config(&path, Some("ftp://nope")).await;
        assert!(matches!(err, Err(RunError::InvalidInput(_))));
        Ok(())
    }
}
