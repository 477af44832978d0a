use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stampede_http::HttpRequest;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cases::join_url;
use crate::executor::HttpExecutor;

use super::config::{OnUnreachable, RunConfig};
use super::error::{Error, Result};
use super::outputs::{RenderedOutput, write_output_files};
use super::progress::{ProgressFn, ProgressUpdate};
use super::ramp::{RampScheduler, RampStatus, WorkerContext};
use super::stats::{Aggregator, RunSummary};
use super::vu::{IterationPlan, run_vu};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Turns the final summary into printable output and report files.
pub type FinalizeFn =
    Box<dyn FnOnce(&RunSummary) -> std::result::Result<RenderedOutput, BoxError> + Send + 'static>;

pub struct RunOptions {
    pub progress: Option<ProgressFn>,
    pub finalize: Option<FinalizeFn>,
    /// Base directory for report files.
    pub output_dir: PathBuf,
    /// Cancel to stop the ramp early (e.g. on Ctrl-C); the run still drains and reports.
    pub shutdown: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            progress: None,
            finalize: None,
            output_dir: PathBuf::from("."),
            shutdown: CancellationToken::new(),
        }
    }
}

impl RunOptions {
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_finalize<F>(mut self, finalize: F) -> Self
    where
        F: FnOnce(&RunSummary) -> std::result::Result<RenderedOutput, BoxError> + Send + 'static,
    {
        self.finalize = Some(Box::new(finalize));
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub ramp: RampStatus,
    pub rendered: RenderedOutput,
}

/// One GET against the probe path before any worker starts.
pub async fn preflight<E: HttpExecutor>(cfg: &RunConfig, executor: &E) -> Result<()> {
    let url = join_url(&cfg.base_url, &cfg.probes.path);
    let outcome = executor
        .execute(HttpRequest::get(url.as_str()).with_timeout(cfg.request_timeout))
        .await;

    let Some(failure) = outcome.failure else {
        tracing::info!(%url, status = outcome.status, latency = ?outcome.latency, "target reachable");
        return Ok(());
    };

    match cfg.on_unreachable {
        OnUnreachable::Abort => {
            tracing::error!(%url, kind = %failure.kind, error = %failure.message, "target unreachable");
            Err(Error::TargetUnreachable {
                url,
                reason: failure.message,
            })
        }
        OnUnreachable::Continue => {
            tracing::warn!(
                %url,
                kind = %failure.kind,
                error = %failure.message,
                "target unreachable, continuing anyway"
            );
            Ok(())
        }
    }
}

fn spawn_progress(
    progress: ProgressFn,
    agg: Arc<Aggregator>,
    status: watch::Receiver<RampStatus>,
    started: Instant,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        let mut tick_id: u64 = 0;
        let mut last_at = Instant::now();
        let mut last_requests_total: u64 = 0;

        loop {
            interval.tick().await;

            tick_id = tick_id.saturating_add(1);
            let now = Instant::now();
            let dt = now.duration_since(last_at);
            last_at = now;

            let summary = agg.progress_snapshot();
            let delta = summary.total_requests.saturating_sub(last_requests_total);
            last_requests_total = summary.total_requests;

            (progress)(ProgressUpdate {
                tick: tick_id,
                elapsed: started.elapsed(),
                rps_now: (delta as f64) / dt.as_secs_f64().max(1e-9),
                ramp: status.borrow().clone(),
                summary,
            });
        }
    })
}

/// Validates, probes the target, runs the whole ramp and renders the final summary.
pub async fn run<E: HttpExecutor>(
    config: RunConfig,
    executor: Arc<E>,
    options: RunOptions,
) -> Result<RunReport> {
    config.validate()?;
    preflight(&config, executor.as_ref()).await?;

    let agg = Arc::new(Aggregator::new());
    let plan = Arc::new(IterationPlan::from_config(&config));
    let scheduler = RampScheduler::new(config.stages.clone(), config.tick);
    let started = Instant::now();

    let progress_handle = options
        .progress
        .clone()
        .map(|p| spawn_progress(p, agg.clone(), scheduler.subscribe(), started));

    let worker = {
        let agg = agg.clone();
        move |ctx: WorkerContext| run_vu(ctx, executor.clone(), plan.clone(), agg.clone())
    };
    let ramp = scheduler.run(options.shutdown.clone(), worker).await;

    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }
    let ramp = ramp?;

    agg.mark_finished(started.elapsed());
    let summary = agg.snapshot();
    tracing::info!(
        requests = summary.total_requests,
        iterations = summary.iterations_total,
        checks_failed = summary.checks_failed_total(),
        "run finished"
    );

    let rendered = match options.finalize {
        Some(finalize) => finalize(&summary).map_err(|e| Error::Finalize(e.to_string()))?,
        None => RenderedOutput::default(),
    };
    write_output_files(&options.output_dir, &rendered.files)?;

    Ok(RunReport {
        summary,
        ramp,
        rendered,
    })
}
