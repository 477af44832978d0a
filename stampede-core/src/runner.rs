mod config;
mod error;
mod outputs;
mod progress;
mod ramp;
mod run;
mod schedule;
mod stats;
mod vu;

pub use config::{
    DEFAULT_LOAD_THRESHOLD, DEFAULT_PROBE_PATH, DEFAULT_RESPONSE_TIME_THRESHOLD, DEFAULT_THINK_TIME,
    DEFAULT_TICK, OnUnreachable, ProbeConfig, RunConfig, Stage,
};
pub use error::{ConfigError, Error, Result};
pub use outputs::{RenderedOutput, validate_output_paths, write_output_files};
pub use progress::{ProgressFn, ProgressUpdate};
pub use ramp::{RampPhase, RampScheduler, RampStatus, WorkerContext};
pub use run::{BoxError, FinalizeFn, RunOptions, RunReport, preflight, run};
pub use schedule::{RampSchedule, StageSnapshot};
pub use stats::{
    Aggregator, CheckCounts, GROUP_LOAD, GROUP_STRESS, GroupSummary, LatencyStats, RunSummary,
};
pub use vu::{IterationPlan, run_iteration, run_vu};
