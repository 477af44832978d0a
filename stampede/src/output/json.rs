use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use stampede_core::runner::{
    CheckCounts, LatencyStats, ProgressFn, ProgressUpdate, RunConfig, RunSummary,
};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _config_path: &Path, _cfg: &RunConfig) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn render_summary(&self, summary: &RunSummary) -> anyhow::Result<String> {
        let mut text = summary_json(summary, false)?;
        text.push('\n');
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub phase: String,
    pub stage: usize,
    pub stages: usize,
    pub target_vus: u64,
    pub active_vus: u64,
    pub running_vus: u64,
    pub requests_per_sec: f64,
    pub total_requests: u64,
    pub iterations_total: u64,
    pub checks_failed_total: u64,
    pub transport_failures_total: u64,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        phase: u.ramp.phase.to_string(),
        stage: u.ramp.stage,
        stages: u.ramp.stages,
        target_vus: u.ramp.target,
        active_vus: u.ramp.active,
        running_vus: u.ramp.running,
        requests_per_sec: u.rps_now,
        total_requests: u.summary.total_requests,
        iterations_total: u.summary.iterations_total,
        checks_failed_total: u.summary.checks_failed_total(),
        transport_failures_total: u.summary.transport_failures_total(),
    }
}

/// Final report: aggregate counters plus latency stats derived from the raw samples.
#[derive(Debug, Serialize)]
pub(crate) struct JsonSummary<'a> {
    pub kind: &'static str,
    pub total_requests: u64,
    pub iterations_total: u64,
    pub run_duration_ms: f64,
    pub requests_per_sec: f64,
    pub checks_total: u64,
    pub checks_failed_total: u64,
    pub transport_failures_total: u64,
    pub iteration_duration: Option<LatencyStats>,
    pub latency: Option<LatencyStats>,
    pub checks: BTreeMap<String, CheckCounts>,
    pub groups: BTreeMap<&'a str, JsonGroup<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonGroup<'a> {
    pub requests: u64,
    pub transport_failures: u64,
    pub statuses: &'a BTreeMap<u16, u64>,
    pub checks: &'a BTreeMap<String, CheckCounts>,
    pub latency: Option<LatencyStats>,
}

pub(crate) fn build_summary(summary: &RunSummary) -> JsonSummary<'_> {
    let groups = summary
        .groups
        .iter()
        .map(|(name, g)| {
            (
                name.as_str(),
                JsonGroup {
                    requests: g.requests,
                    transport_failures: g.transport_failures,
                    statuses: &g.statuses,
                    checks: &g.checks,
                    latency: LatencyStats::from_samples(&g.latencies),
                },
            )
        })
        .collect();

    JsonSummary {
        kind: "summary",
        total_requests: summary.total_requests,
        iterations_total: summary.iterations_total,
        run_duration_ms: summary.run_duration.as_secs_f64() * 1_000.0,
        requests_per_sec: summary.requests_per_sec(),
        checks_total: summary.checks_total(),
        checks_failed_total: summary.checks_failed_total(),
        transport_failures_total: summary.transport_failures_total(),
        iteration_duration: summary.iteration_duration,
        latency: summary.overall_latency_stats(),
        checks: summary.check_counts(),
        groups,
    }
}

pub(crate) fn summary_json(summary: &RunSummary, pretty: bool) -> anyhow::Result<String> {
    let doc = build_summary(summary);
    let text = if pretty {
        serde_json::to_string_pretty(&doc)?
    } else {
        serde_json::to_string(&doc)?
    };
    Ok(text)
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
