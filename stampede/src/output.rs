use std::path::Path;
use std::sync::Arc;

use stampede_core::runner::{ProgressFn, RunConfig, RunSummary};

use crate::cli::OutputFormat;

pub(crate) mod html;
mod human;
pub(crate) mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, config_path: &Path, cfg: &RunConfig);
    fn progress(&self) -> Option<ProgressFn>;
    /// Text printed to stdout once the run is over.
    fn render_summary(&self, summary: &RunSummary) -> anyhow::Result<String>;
    /// Tears down live output before the summary is printed.
    fn finish(&self) {}
}

pub(crate) fn formatter(format: OutputFormat) -> Arc<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Arc::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Arc::new(json::JsonOutput),
    }
}
