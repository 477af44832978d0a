use std::sync::Arc;
use std::time::Duration;

use super::ramp::RampStatus;
use super::stats::RunSummary;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    /// Requests/sec observed during the last progress interval.
    pub rps_now: f64,
    pub ramp: RampStatus,
    /// Counters only; latency samples are left out until the final summary.
    pub summary: RunSummary,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
