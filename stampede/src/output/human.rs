use std::path::Path;
use std::sync::Arc;

pub(super) mod format;
mod progress;
mod summary;

use format::{format_duration, format_rate};
use progress::HumanProgress;
use stampede_core::runner::{ProgressFn, ProgressUpdate, RunConfig, RunSummary};

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, config_path: &Path, cfg: &RunConfig) {
        println!("config: {}", config_path.display());
        println!(
            "target: {} tests={} stages={} duration={} peak_vus={}",
            cfg.base_url,
            cfg.tests.len(),
            cfg.stages.len(),
            format_duration(cfg.total_duration()),
            cfg.max_target()
        );
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u| {
            progress.update(u.ramp.total_duration, u.elapsed, progress_message(&u));
        }))
    }

    fn render_summary(&self, summary: &RunSummary) -> anyhow::Result<String> {
        Ok(summary::render(summary))
    }

    fn finish(&self) {
        self.progress.finish();
    }
}

fn progress_message(u: &ProgressUpdate) -> String {
    format!(
        "stage={}/{} target={} vus={} elapsed={} iters={} rps={} checks_failed={}",
        u.ramp.stage.saturating_add(1).min(u.ramp.stages),
        u.ramp.stages,
        u.ramp.target,
        u.ramp.active,
        format_duration(u.elapsed),
        u.summary.iterations_total,
        format_rate(u.rps_now),
        u.summary.checks_failed_total()
    )
}
