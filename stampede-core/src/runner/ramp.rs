use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::config::Stage;
use super::error::{Error, Result};
use super::schedule::RampSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RampPhase {
    Ramping,
    Draining,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampStatus {
    pub phase: RampPhase,
    /// 0-based index of the current stage.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub elapsed: Duration,
    pub total_duration: Duration,
    pub target: u64,
    /// Assigned workers that are alive and not asked to stop.
    pub active: u64,
    /// Worker tasks still alive, including ones finishing their last iteration.
    pub running: u64,
    pub peak: u64,
}

impl RampStatus {
    fn initial(stages: usize, total_duration: Duration) -> Self {
        Self {
            phase: RampPhase::Ramping,
            stage: 0,
            stages,
            stage_elapsed: Duration::ZERO,
            elapsed: Duration::ZERO,
            total_duration,
            target: 0,
            active: 0,
            running: 0,
            peak: 0,
        }
    }
}

/// Handed to every worker the scheduler starts.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// 1-based, in spawn order.
    pub worker_id: u64,
    /// Cancelled when the worker should stop after its current iteration.
    pub stop: CancellationToken,
}

/// A spawned worker as the scheduler sees it.
#[derive(Debug)]
struct WorkerSlot {
    id: u64,
    stop: CancellationToken,
    exited: Arc<AtomicBool>,
}

impl WorkerSlot {
    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }
}

/// Moved into the worker task; flips the slot's flag when the task ends, panics included.
struct ExitFlag(Arc<AtomicBool>);

impl Drop for ExitFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

fn ensure_all_exited<'a>(slots: impl IntoIterator<Item = &'a WorkerSlot>) -> Result<()> {
    let alive: Vec<u64> = slots
        .into_iter()
        .filter(|w| !w.has_exited())
        .map(|w| w.id)
        .collect();
    if alive.is_empty() {
        return Ok(());
    }
    tracing::error!(workers = ?alive, "workers still alive after drain");
    Err(Error::Invariant(format!(
        "{} workers still alive after drain",
        alive.len()
    )))
}

/// Keeps the number of live workers on the staged ramp.
///
/// Every tick the interpolated target is compared with the assigned workers that are
/// still alive: missing workers are spawned (including replacements for workers that
/// ended on their own), surplus ones are asked to stop (most recent first). When the
/// timeline is over, every worker is stopped and awaited.
#[derive(Debug)]
pub struct RampScheduler {
    schedule: RampSchedule,
    tick: Duration,
    status_tx: watch::Sender<RampStatus>,
}

impl RampScheduler {
    pub fn new(stages: Vec<Stage>, tick: Duration) -> Self {
        let schedule = RampSchedule::new(stages);
        let (status_tx, _) = watch::channel(RampStatus::initial(
            schedule.stages().len(),
            schedule.total_duration(),
        ));
        Self {
            schedule,
            tick,
            status_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RampStatus> {
        self.status_tx.subscribe()
    }

    /// Drives the ramp to completion and returns the terminal status.
    ///
    /// Cancelling `shutdown` skips the rest of the timeline and drains immediately.
    pub async fn run<F, Fut>(self, shutdown: CancellationToken, worker: F) -> Result<RampStatus>
    where
        F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tracker = TaskTracker::new();
        let all_workers = shutdown.child_token();
        let mut assigned: Vec<WorkerSlot> = Vec::new();
        let mut retiring: Vec<WorkerSlot> = Vec::new();
        let mut next_worker_id: u64 = 1;
        let mut peak: u64 = 0;
        let mut last_stage: Option<usize> = None;

        let started = Instant::now();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            stages = self.schedule.stages().len(),
            total_duration = ?self.schedule.total_duration(),
            "ramp started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, draining workers");
                    break;
                }
            }

            let elapsed = started.elapsed();
            if self.schedule.is_done(elapsed) {
                break;
            }

            let target = self.schedule.target_at(elapsed);
            let snapshot = self.schedule.stage_snapshot_at(elapsed);
            let stage = snapshot.as_ref().map_or(0, |s| s.index);
            if last_stage != Some(stage) {
                tracing::info!(
                    stage = stage + 1,
                    stages = self.schedule.stages().len(),
                    target = snapshot.as_ref().map_or(0, |s| s.end_target),
                    "entering stage"
                );
                last_stage = Some(stage);
            }

            assigned.retain(|w| {
                let exited = w.has_exited();
                if exited {
                    tracing::warn!(worker_id = w.id, "worker exited without being stopped, replacing it");
                }
                !exited
            });
            retiring.retain(|w| !w.has_exited());

            let active = assigned.len() as u64;
            if active < target {
                let spawn = target - active;
                tracing::debug!(active, target, spawn, "spawning workers");
                for _ in 0..spawn {
                    let stop = all_workers.child_token();
                    let exited = Arc::new(AtomicBool::new(false));
                    let flag = ExitFlag(exited.clone());
                    let fut = worker(WorkerContext {
                        worker_id: next_worker_id,
                        stop: stop.clone(),
                    });
                    tracker.spawn(async move {
                        let _flag = flag;
                        fut.await;
                    });
                    assigned.push(WorkerSlot {
                        id: next_worker_id,
                        stop,
                        exited,
                    });
                    next_worker_id = next_worker_id.saturating_add(1);
                }
            } else if active > target {
                let retire = active - target;
                tracing::debug!(active, target, retire, "draining workers");
                for _ in 0..retire {
                    if let Some(slot) = assigned.pop() {
                        slot.stop.cancel();
                        retiring.push(slot);
                    }
                }
            }

            let active = assigned.len() as u64;
            peak = peak.max(active);

            self.status_tx.send_replace(RampStatus {
                phase: RampPhase::Ramping,
                stage,
                stages: self.schedule.stages().len(),
                stage_elapsed: snapshot.as_ref().map_or(Duration::ZERO, |s| s.stage_elapsed),
                elapsed,
                total_duration: self.schedule.total_duration(),
                target,
                active,
                running: tracker.len() as u64,
                peak,
            });
        }

        let drain_stage = self.schedule.stages().len().saturating_sub(1);
        self.status_tx.send_modify(|s| {
            s.phase = RampPhase::Draining;
            s.stage = drain_stage;
            s.elapsed = started.elapsed();
            s.target = 0;
            s.active = 0;
            s.running = tracker.len() as u64;
            s.peak = peak;
        });
        tracing::debug!(running = tracker.len(), "draining all workers");

        all_workers.cancel();
        tracker.close();
        tracker.wait().await;

        let terminal = RampStatus {
            phase: RampPhase::Terminal,
            stage: drain_stage,
            stages: self.schedule.stages().len(),
            stage_elapsed: Duration::ZERO,
            elapsed: started.elapsed(),
            total_duration: self.schedule.total_duration(),
            target: 0,
            active: 0,
            running: tracker.len() as u64,
            peak,
        };
        self.status_tx.send_replace(terminal.clone());

        ensure_all_exited(assigned.iter().chain(&retiring))?;

        tracing::info!(peak, elapsed = ?terminal.elapsed, "ramp finished");
        Ok(terminal)
    }
}
