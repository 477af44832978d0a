use std::fmt::Write as _;

use stampede_core::runner::{GroupSummary, RunSummary};

use super::format::*;

pub(crate) fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    if summary.groups.is_empty() {
        out.push_str("summary: no requests were recorded\n");
        return out;
    }

    for (name, g) in summary.groups_in_order() {
        render_group(name, g, summary, &mut out);
        out.push('\n');
    }

    out.push_str("totals\n");
    writeln!(
        &mut out,
        "  duration: {}",
        format_duration(summary.run_duration)
    )
    .ok();
    writeln!(
        &mut out,
        "  requests: {} (transport failures {})",
        summary.total_requests,
        summary.transport_failures_total()
    )
    .ok();
    writeln!(
        &mut out,
        "  rates: rps={}",
        format_rate(summary.requests_per_sec())
    )
    .ok();

    match &summary.iteration_duration {
        Some(it) => writeln!(
            &mut out,
            "  iterations: {} duration {}",
            summary.iterations_total,
            format_latency_stats(it)
        )
        .ok(),
        None => writeln!(&mut out, "  iterations: {}", summary.iterations_total).ok(),
    };

    if let Some(l) = summary.overall_latency_stats() {
        writeln!(&mut out, "  latency: {}", format_latency_stats(&l)).ok();
    }

    let checks_total = summary.checks_total();
    let checks_failed = summary.checks_failed_total();
    writeln!(
        &mut out,
        "  checks: {}/{} passed ({}), failed {}",
        checks_total.saturating_sub(checks_failed),
        checks_total,
        format_pct(checks_total.saturating_sub(checks_failed), checks_total),
        checks_failed
    )
    .ok();

    for (name, c) in summary.check_counts() {
        writeln!(
            &mut out,
            "    {} {name}: {}/{}",
            check_mark(c.fails),
            c.passes,
            c.total()
        )
        .ok();
    }

    out
}

fn render_group(name: &str, g: &GroupSummary, summary: &RunSummary, out: &mut String) {
    writeln!(out, "group: {name}").ok();

    let statuses = g
        .statuses
        .iter()
        .map(|(status, n)| format!("{status}={n}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(
        out,
        "  requests: {} (transport failures {}) statuses: {}",
        g.requests,
        g.transport_failures,
        if statuses.is_empty() { "-" } else { statuses.as_str() }
    )
    .ok();

    match summary.latency_stats(name) {
        Some(l) => writeln!(out, "  latency: {}", format_latency_stats(&l)).ok(),
        None => writeln!(out, "  latency: n/a").ok(),
    };

    for (check, c) in &g.checks {
        if c.fails > 0 {
            writeln!(
                out,
                "  {} {check}: {}/{} ({} failed)",
                check_mark(c.fails),
                c.passes,
                c.total(),
                c.fails
            )
            .ok();
        } else {
            writeln!(
                out,
                "  {} {check}: {}/{}",
                check_mark(c.fails),
                c.passes,
                c.total()
            )
            .ok();
        }
    }
}

fn check_mark(fails: u64) -> &'static str {
    if fails == 0 { "✓" } else { "✗" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::runner::Aggregator;
    use stampede_core::{CheckResult, RequestOutcome};
    use std::sync::Arc;
    use std::time::Duration;

    fn result(name: &str, passed: bool) -> CheckResult {
        CheckResult {
            name: Arc::from(name),
            passed,
        }
    }

    #[test]
    fn render_lists_groups_checks_and_totals() {
        let agg = Aggregator::new();
        agg.record_exchange(
            "List Products - Success",
            &RequestOutcome::response(200, Duration::from_millis(120), "[]"),
            &[
                result("status-code-matches", true),
                result("response-time-under-threshold", true),
            ],
        );
        agg.record_exchange(
            "load",
            &RequestOutcome::response(200, Duration::from_millis(900), "[]"),
            &[
                result("status-is-200", true),
                result("response-time-under-threshold", false),
            ],
        );
        agg.record_iteration(Duration::from_secs(1));
        agg.mark_finished(Duration::from_secs(2));

        let text = render(&agg.snapshot());

        assert!(text.contains("group: List Products - Success"));
        assert!(text.contains("group: load"));
        assert!(text.contains("statuses: 200=1"));
        assert!(text.contains("✗ response-time-under-threshold: 0/1 (1 failed)"));
        assert!(text.contains("✓ status-code-matches: 1/1"));
        assert!(text.contains("requests: 2 (transport failures 0)"));
        assert!(text.contains("iterations: 1"));
        assert!(text.contains("checks: 3/4 passed (75.00%), failed 1"));
        assert!(text.contains("    ✗ response-time-under-threshold: 1/2"));
        assert!(text.contains("rates: rps=1"));
    }

    #[test]
    fn groups_are_rendered_in_recorded_order() {
        let agg = Aggregator::new();
        for group in ["Wrong Path", "List Products - Success", "load", "stress"] {
            agg.record_latency(group, Duration::from_millis(5));
        }

        let text = render(&agg.snapshot());
        let at = |name: &str| {
            text.find(&format!("group: {name}\n"))
                .unwrap_or_else(|| panic!("missing group {name}"))
        };
        assert!(at("Wrong Path") < at("List Products - Success"));
        assert!(at("List Products - Success") < at("load"));
        assert!(at("load") < at("stress"));
    }

    #[test]
    fn render_handles_an_empty_run() {
        let agg = Aggregator::new();
        assert!(render(&agg.snapshot()).contains("no requests"));
    }
}
