use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use crate::check::CheckResult;
use crate::executor::RequestOutcome;

/// Group for the per-iteration probe asserting latency under load.
pub const GROUP_LOAD: &str = "load";
/// Group for the per-iteration availability probe.
pub const GROUP_STRESS: &str = "stress";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

impl CheckCounts {
    pub fn total(&self) -> u64 {
        self.passes.saturating_add(self.fails)
    }

    fn merge(&mut self, other: &CheckCounts) {
        self.passes = self.passes.saturating_add(other.passes);
        self.fails = self.fails.saturating_add(other.fails);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub requests: u64,
    pub checks: BTreeMap<String, CheckCounts>,
    /// Samples in record order.
    #[serde(serialize_with = "ser::durations_ms")]
    pub latencies: Vec<Duration>,
    pub transport_failures: u64,
    /// Responses by HTTP status. Transport failures are counted separately.
    pub statuses: BTreeMap<u16, u64>,
    /// 0-based position in which the group was first recorded.
    #[serde(skip)]
    pub first_seen: u64,
}

impl GroupSummary {
    /// Copy of the counters without the latency samples.
    fn counters(&self) -> Self {
        Self {
            requests: self.requests,
            checks: self.checks.clone(),
            latencies: Vec::new(),
            transport_failures: self.transport_failures,
            statuses: self.statuses.clone(),
            first_seen: self.first_seen,
        }
    }

    fn record_latency(&mut self, latency: Duration) {
        self.requests = self.requests.saturating_add(1);
        self.latencies.push(latency);
    }

    fn record_outcome(&mut self, outcome: &RequestOutcome) {
        self.record_latency(outcome.latency);
        if outcome.is_transport_failure() {
            self.transport_failures = self.transport_failures.saturating_add(1);
        } else {
            let n = self.statuses.entry(outcome.status).or_default();
            *n = n.saturating_add(1);
        }
    }

    fn record_checks(&mut self, results: &[CheckResult]) {
        for r in results {
            if !self.checks.contains_key(&*r.name) {
                self.checks.insert(r.name.to_string(), CheckCounts::default());
            }
            let Some(counts) = self.checks.get_mut(&*r.name) else {
                continue;
            };
            if r.passed {
                counts.passes = counts.passes.saturating_add(1);
            } else {
                counts.fails = counts.fails.saturating_add(1);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    #[serde(serialize_with = "ser::duration_ms")]
    pub mean: Duration,
    #[serde(serialize_with = "ser::duration_ms")]
    pub p50: Duration,
    #[serde(serialize_with = "ser::duration_ms")]
    pub p90: Duration,
    #[serde(serialize_with = "ser::duration_ms")]
    pub p95: Duration,
    #[serde(serialize_with = "ser::duration_ms")]
    pub p99: Duration,
    #[serde(serialize_with = "ser::duration_ms")]
    pub max: Duration,
}

impl LatencyStats {
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Duration>) -> Option<Self> {
        let mut hist = new_histogram()?;
        for d in samples {
            hist.saturating_record(d.as_micros().min(u64::MAX as u128) as u64);
        }
        Self::from_histogram(&hist)
    }

    fn from_histogram(hist: &Histogram<u64>) -> Option<Self> {
        if hist.is_empty() {
            return None;
        }

        let us = Duration::from_micros;
        Some(Self {
            count: hist.len(),
            mean: us(hist.mean().round() as u64),
            p50: us(hist.value_at_quantile(0.50)),
            p90: us(hist.value_at_quantile(0.90)),
            p95: us(hist.value_at_quantile(0.95)),
            p99: us(hist.value_at_quantile(0.99)),
            max: us(hist.max()),
        })
    }
}

fn new_histogram() -> Option<Histogram<u64>> {
    // Microseconds, up to one hour, 3 significant figures.
    Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3).ok()
}

/// Point-in-time view of everything the aggregator has seen.
///
/// Summaries from [`Aggregator::progress_snapshot`] carry no latency samples, so
/// their latency views are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_requests: u64,
    pub iterations_total: u64,
    /// Zero until the run has finished.
    #[serde(serialize_with = "ser::duration_ms")]
    pub run_duration: Duration,
    pub iteration_duration: Option<LatencyStats>,
    pub groups: BTreeMap<String, GroupSummary>,
}

impl RunSummary {
    /// Groups in the order they were first recorded, which follows the suite order.
    pub fn groups_in_order(&self) -> Vec<(&str, &GroupSummary)> {
        let mut groups: Vec<(&str, &GroupSummary)> =
            self.groups.iter().map(|(k, v)| (k.as_str(), v)).collect();
        groups.sort_by_key(|(_, g)| g.first_seen);
        groups
    }

    /// Counts per check name, folded across groups.
    pub fn check_counts(&self) -> BTreeMap<String, CheckCounts> {
        let mut out: BTreeMap<String, CheckCounts> = BTreeMap::new();
        for g in self.groups.values() {
            for (name, counts) in &g.checks {
                out.entry(name.clone()).or_default().merge(counts);
            }
        }
        out
    }

    pub fn checks_failed_total(&self) -> u64 {
        self.groups
            .values()
            .flat_map(|g| g.checks.values())
            .map(|c| c.fails)
            .sum()
    }

    pub fn checks_total(&self) -> u64 {
        self.groups
            .values()
            .flat_map(|g| g.checks.values())
            .map(CheckCounts::total)
            .sum()
    }

    pub fn transport_failures_total(&self) -> u64 {
        self.groups.values().map(|g| g.transport_failures).sum()
    }

    pub fn latency_stats(&self, group: &str) -> Option<LatencyStats> {
        LatencyStats::from_samples(&self.groups.get(group)?.latencies)
    }

    /// Latency across every group.
    pub fn overall_latency_stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_samples(self.groups.values().flat_map(|g| g.latencies.iter()))
    }

    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.run_duration.as_secs_f64();
        if secs > 0.0 {
            self.total_requests as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
struct IterationState {
    total: u64,
    hist: Option<Histogram<u64>>,
}

/// Process-wide accumulator shared by every virtual user.
///
/// Each group has its own lock; a record call updates one group atomically, so a
/// snapshot never sees half of a call.
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: DashMap<Arc<str>, Arc<Mutex<GroupSummary>>>,
    next_group: AtomicU64,
    iterations: Mutex<IterationState>,
    run_duration: Mutex<Duration>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn group(&self, name: &str) -> Arc<Mutex<GroupSummary>> {
        if let Some(g) = self.groups.get(name) {
            return g.value().clone();
        }
        self.groups
            .entry(Arc::from(name))
            .or_insert_with(|| {
                Arc::new(Mutex::new(GroupSummary {
                    first_seen: self.next_group.fetch_add(1, Ordering::Relaxed),
                    ..GroupSummary::default()
                }))
            })
            .value()
            .clone()
    }

    pub fn record_checks(&self, group: &str, results: &[CheckResult]) {
        self.group(group).lock().record_checks(results);
    }

    /// Records one request sample by latency alone.
    pub fn record_latency(&self, group: &str, latency: Duration) {
        self.group(group).lock().record_latency(latency);
    }

    pub fn record_outcome(&self, group: &str, outcome: &RequestOutcome) {
        self.group(group).lock().record_outcome(outcome);
    }

    /// Outcome and its check results in one update.
    pub fn record_exchange(&self, group: &str, outcome: &RequestOutcome, results: &[CheckResult]) {
        let g = self.group(group);
        let mut g = g.lock();
        g.record_outcome(outcome);
        g.record_checks(results);
    }

    pub fn record_iteration(&self, duration: Duration) {
        let mut it = self.iterations.lock();
        it.total = it.total.saturating_add(1);
        if it.hist.is_none() {
            it.hist = new_histogram();
        }
        if let Some(h) = it.hist.as_mut() {
            h.saturating_record(duration.as_micros().min(u64::MAX as u128) as u64);
        }
    }

    pub fn mark_finished(&self, run_duration: Duration) {
        *self.run_duration.lock() = run_duration;
    }

    /// Full view, latency samples included.
    pub fn snapshot(&self) -> RunSummary {
        self.collect(GroupSummary::clone)
    }

    /// Counters only. Cheap enough to take every progress tick.
    pub fn progress_snapshot(&self) -> RunSummary {
        self.collect(GroupSummary::counters)
    }

    fn collect(&self, copy: impl Fn(&GroupSummary) -> GroupSummary) -> RunSummary {
        let handles: Vec<(Arc<str>, Arc<Mutex<GroupSummary>>)> = self
            .groups
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut groups = BTreeMap::new();
        for (name, g) in handles {
            groups.insert(name.to_string(), copy(&*g.lock()));
        }
        let total_requests = groups.values().map(|g: &GroupSummary| g.requests).sum();

        let (iterations_total, iteration_duration) = {
            let it = self.iterations.lock();
            (
                it.total,
                it.hist.as_ref().and_then(LatencyStats::from_histogram),
            )
        };

        RunSummary {
            total_requests,
            iterations_total,
            run_duration: *self.run_duration.lock(),
            iteration_duration,
            groups,
        }
    }
}

mod ser {
    use std::time::Duration;

    use serde::Serializer;

    pub fn duration_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }

    pub fn durations_ms<S: Serializer>(v: &[Duration], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(v.iter().map(|d| d.as_secs_f64() * 1000.0))
    }
}
