use std::time::Duration;

use stampede_core::runner::LatencyStats;

/// Single rounded component in one of: us, ms, s. Keeps progress lines short.
pub(crate) fn format_duration(d: Duration) -> String {
    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    let total_ns = d.as_nanos();
    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }
    format!("{}us", round_div(total_ns, NS_PER_US))
}

/// Milliseconds with two decimals, the unit latency thresholds are written in.
pub(crate) fn format_latency(d: Duration) -> String {
    format!("{:.2}ms", d.as_secs_f64() * 1_000.0)
}

pub(crate) fn format_latency_stats(s: &LatencyStats) -> String {
    format!(
        "p50={} p90={} p95={} p99={} mean={} max={} (n={})",
        format_latency(s.p50),
        format_latency(s.p90),
        format_latency(s.p95),
        format_latency(s.p99),
        format_latency(s.mean),
        format_latency(s.max),
        s.count
    )
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_pct(part: u64, total: u64) -> String {
    if total == 0 {
        return "n/a".to_string();
    }
    format!("{:.2}%", (part as f64) * 100.0 / (total as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_picks_one_unit() {
        assert_eq!(format_duration(Duration::from_micros(250)), "250us");
        assert_eq!(format_duration(Duration::from_micros(1_500)), "2ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(12_400)), "12s");
    }

    #[test]
    fn format_latency_uses_milliseconds() {
        assert_eq!(format_latency(Duration::from_micros(12_500)), "12.50ms");
        assert_eq!(format_latency(Duration::ZERO), "0.00ms");
    }

    #[test]
    fn format_pct_handles_empty_totals() {
        assert_eq!(format_pct(0, 0), "n/a");
        assert_eq!(format_pct(1, 4), "25.00%");
    }

    #[test]
    fn format_rate_ignores_non_finite() {
        assert_eq!(format_rate(f64::NAN), "0");
        assert_eq!(format_rate(42.4), "42");
    }
}
