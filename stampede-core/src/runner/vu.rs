use std::sync::Arc;
use std::time::Duration;

use stampede_http::HttpRequest;
use tokio::time::Instant;

use crate::cases::{SuiteOptions, TestCase, join_url, run_all};
use crate::check::{
    CHECK_RESPONSE_TIME_UNDER_THRESHOLD, CHECK_STATUS_IS_200, Check, evaluate,
};
use crate::executor::HttpExecutor;

use super::config::RunConfig;
use super::ramp::WorkerContext;
use super::stats::{Aggregator, GROUP_LOAD, GROUP_STRESS};

/// Everything one iteration needs, shared read-only by all virtual users.
#[derive(Debug)]
pub struct IterationPlan {
    pub base_url: String,
    pub cases: Vec<TestCase>,
    pub suite: SuiteOptions,
    pub probe_url: String,
    pub load_checks: Vec<Check>,
    pub stress_checks: Vec<Check>,
    pub think_time: Duration,
}

impl IterationPlan {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            cases: cfg.tests.clone(),
            suite: SuiteOptions {
                response_time_threshold: cfg.response_time_threshold,
                request_timeout: cfg.request_timeout,
            },
            probe_url: join_url(&cfg.base_url, &cfg.probes.path),
            load_checks: vec![
                Check::status_is(CHECK_STATUS_IS_200, 200),
                Check::latency_under(
                    CHECK_RESPONSE_TIME_UNDER_THRESHOLD,
                    cfg.probes.load_threshold,
                ),
            ],
            stress_checks: vec![Check::status_is(CHECK_STATUS_IS_200, 200)],
            think_time: cfg.think_time,
        }
    }

    fn probe_request(&self) -> HttpRequest {
        HttpRequest::get(self.probe_url.as_str()).with_timeout(self.suite.request_timeout)
    }
}

/// Suite in order, then the `load` probe, then the `stress` probe.
pub async fn run_iteration<E: HttpExecutor>(executor: &E, plan: &IterationPlan, agg: &Aggregator) {
    for report in run_all(executor, &plan.base_url, &plan.cases, &plan.suite).await {
        agg.record_exchange(&report.name, &report.outcome, &report.checks);
    }

    let outcome = executor.execute(plan.probe_request()).await;
    agg.record_exchange(GROUP_LOAD, &outcome, &evaluate(&outcome, &plan.load_checks));

    let outcome = executor.execute(plan.probe_request()).await;
    agg.record_exchange(GROUP_STRESS, &outcome, &evaluate(&outcome, &plan.stress_checks));
}

/// Loops iterations until the worker is asked to stop.
///
/// The stop signal is only observed between iterations and during think time, so a
/// request in flight always completes and gets recorded.
pub async fn run_vu<E: HttpExecutor>(
    ctx: WorkerContext,
    executor: Arc<E>,
    plan: Arc<IterationPlan>,
    agg: Arc<Aggregator>,
) {
    tracing::debug!(vu = ctx.worker_id, "virtual user started");
    let mut iterations: u64 = 0;

    while !ctx.stop.is_cancelled() {
        let started = Instant::now();
        run_iteration(executor.as_ref(), &plan, &agg).await;
        agg.record_iteration(started.elapsed());
        iterations = iterations.saturating_add(1);

        tokio::select! {
            _ = tokio::time::sleep(plan.think_time) => {}
            _ = ctx.stop.cancelled() => break,
        }
    }

    tracing::debug!(vu = ctx.worker_id, iterations, "virtual user stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RequestOutcome;
    use crate::runner::config::Stage;
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Answers 200 after `latency` of (virtual) time and remembers each URL.
    #[derive(Debug, Default)]
    struct Slow {
        latency: Duration,
        seen: Mutex<Vec<String>>,
    }

    impl HttpExecutor for Slow {
        async fn execute(&self, req: HttpRequest) -> RequestOutcome {
            self.seen.lock().push(req.url);
            tokio::time::sleep(self.latency).await;
            RequestOutcome::response(200, self.latency, "[]")
        }
    }

    fn config() -> RunConfig {
        let mut cfg = RunConfig::new(
            "http://store",
            vec![
                TestCase::new("List Products", http::Method::GET, "/products", 200),
                TestCase::new("Limit Results", http::Method::GET, "/products?limit=5", 200),
            ],
            vec![Stage::new(Duration::from_secs(1), 1)],
        );
        cfg.probes.load_threshold = Duration::from_millis(800);
        cfg
    }

    #[tokio::test(start_paused = true)]
    async fn iteration_runs_suite_then_load_then_stress() {
        let exec = Slow {
            latency: Duration::from_millis(900),
            ..Default::default()
        };
        let plan = IterationPlan::from_config(&config());
        let agg = Aggregator::new();

        run_iteration(&exec, &plan, &agg).await;

        assert_eq!(
            exec.seen.lock().clone(),
            vec![
                "http://store/products".to_string(),
                "http://store/products?limit=5".to_string(),
                "http://store/products".to_string(),
                "http://store/products".to_string(),
            ]
        );

        let s = agg.snapshot();
        assert_eq!(s.total_requests, 4);
        let load = &s.groups[GROUP_LOAD].checks;
        assert_eq!(load["status-is-200"].passes, 1);
        // 900ms is over the 800ms load bound but under the 1000ms suite bound.
        assert_eq!(load["response-time-under-threshold"].fails, 1);
        assert_eq!(
            s.groups["List Products"].checks["response-time-under-threshold"].passes,
            1
        );
        let stress = &s.groups[GROUP_STRESS].checks;
        assert_eq!(stress.len(), 1);
        assert_eq!(stress["status-is-200"].passes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_think_time_ends_the_loop_without_waiting() {
        let exec = Arc::new(Slow {
            latency: Duration::from_millis(10),
            ..Default::default()
        });
        let mut cfg = config();
        cfg.think_time = Duration::from_secs(3600);
        let plan = Arc::new(IterationPlan::from_config(&cfg));
        let agg = Arc::new(Aggregator::new());
        let stop = CancellationToken::new();

        let handle = tokio::spawn(run_vu(
            WorkerContext {
                worker_id: 1,
                stop: stop.clone(),
            },
            exec,
            plan,
            agg.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        stop.cancel();
        handle.await.unwrap_or_else(|e| panic!("join: {e}"));

        assert!(before.elapsed() < Duration::from_secs(1));
        let s = agg.snapshot();
        assert_eq!(s.iterations_total, 1);
        let it = s
            .iteration_duration
            .unwrap_or_else(|| panic!("iteration duration recorded"));
        assert_eq!(it.count, 1);
        assert!(it.max >= Duration::from_millis(40) && it.max < Duration::from_millis(41));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_iteration_lets_in_flight_requests_finish() {
        let exec = Arc::new(Slow {
            latency: Duration::from_secs(1),
            ..Default::default()
        });
        let plan = Arc::new(IterationPlan::from_config(&config()));
        let agg = Arc::new(Aggregator::new());
        let stop = CancellationToken::new();

        let handle = tokio::spawn(run_vu(
            WorkerContext {
                worker_id: 7,
                stop: stop.clone(),
            },
            exec,
            plan,
            agg.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        stop.cancel();
        handle.await.unwrap_or_else(|e| panic!("join: {e}"));

        let s = agg.snapshot();
        assert_eq!(s.iterations_total, 1);
        assert_eq!(s.total_requests, 4);
    }
}
