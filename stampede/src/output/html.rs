use askama::Template;
use stampede_core::runner::{RunConfig, RunSummary, Stage};

use super::human::format::{format_duration, format_latency, format_pct};

/// What the report needs to know about the run besides its summary.
#[derive(Debug, Clone)]
pub(crate) struct ReportContext {
    pub title: String,
    pub base_url: String,
    pub stages: Vec<Stage>,
}

impl ReportContext {
    pub(crate) fn new(title: impl Into<String>, cfg: &RunConfig) -> Self {
        Self {
            title: title.into(),
            base_url: cfg.base_url.clone(),
            stages: cfg.stages.clone(),
        }
    }
}

struct TotalRow {
    label: &'static str,
    value: String,
}

struct StageRow {
    index: usize,
    duration: String,
    target: u64,
}

struct GroupRow {
    name: String,
    requests: u64,
    transport_failures: u64,
    statuses: String,
    p50: String,
    p90: String,
    p95: String,
    p99: String,
    mean: String,
    max: String,
}

struct CheckRow {
    group: String,
    name: String,
    passes: u64,
    fails: u64,
    rate: String,
    ok: bool,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    title: &'a str,
    base_url: &'a str,
    passed: bool,
    totals: Vec<TotalRow>,
    stages: Vec<StageRow>,
    groups: Vec<GroupRow>,
    checks: Vec<CheckRow>,
}

pub(crate) fn render_report(ctx: &ReportContext, summary: &RunSummary) -> anyhow::Result<String> {
    let checks_total = summary.checks_total();
    let checks_failed = summary.checks_failed_total();

    let mut totals = vec![
        TotalRow {
            label: "Duration",
            value: format_duration(summary.run_duration),
        },
        TotalRow {
            label: "Requests",
            value: summary.total_requests.to_string(),
        },
        TotalRow {
            label: "Requests/sec",
            value: format!("{:.1}", summary.requests_per_sec()),
        },
        TotalRow {
            label: "Iterations",
            value: summary.iterations_total.to_string(),
        },
        TotalRow {
            label: "Transport failures",
            value: summary.transport_failures_total().to_string(),
        },
        TotalRow {
            label: "Checks passed",
            value: format!(
                "{}/{} ({})",
                checks_total.saturating_sub(checks_failed),
                checks_total,
                format_pct(checks_total.saturating_sub(checks_failed), checks_total)
            ),
        },
    ];
    if let Some(it) = &summary.iteration_duration {
        totals.push(TotalRow {
            label: "Iteration p95",
            value: format_latency(it.p95),
        });
    }

    let stages = ctx
        .stages
        .iter()
        .enumerate()
        .map(|(idx, s)| StageRow {
            index: idx + 1,
            duration: format_duration(s.duration),
            target: s.target,
        })
        .collect();

    let ordered = summary.groups_in_order();

    let groups = ordered
        .iter()
        .map(|&(name, g)| {
            let lat = summary.latency_stats(name);
            let cell = |f: fn(&stampede_core::runner::LatencyStats) -> std::time::Duration| {
                lat.as_ref()
                    .map_or_else(|| "-".to_string(), |l| format_latency(f(l)))
            };
            GroupRow {
                name: name.to_string(),
                requests: g.requests,
                transport_failures: g.transport_failures,
                statuses: g
                    .statuses
                    .iter()
                    .map(|(status, n)| format!("{status}×{n}"))
                    .collect::<Vec<_>>()
                    .join(", "),
                p50: cell(|l| l.p50),
                p90: cell(|l| l.p90),
                p95: cell(|l| l.p95),
                p99: cell(|l| l.p99),
                mean: cell(|l| l.mean),
                max: cell(|l| l.max),
            }
        })
        .collect();

    let checks = ordered
        .iter()
        .flat_map(|&(group, g)| {
            g.checks.iter().map(move |(name, c)| CheckRow {
                group: group.to_string(),
                name: name.clone(),
                passes: c.passes,
                fails: c.fails,
                rate: format_pct(c.passes, c.total()),
                ok: c.fails == 0,
            })
        })
        .collect();

    let tpl = ReportTemplate {
        title: &ctx.title,
        base_url: &ctx.base_url,
        passed: checks_failed == 0,
        totals,
        stages,
        groups,
        checks,
    };

    Ok(tpl.render()?)
}
