use std::time::Duration;

use stampede_http::HttpRequest;

use crate::check::{
    CHECK_RESPONSE_TIME_UNDER_THRESHOLD, CHECK_STATUS_CODE_MATCHES, Check, CheckResult, evaluate,
};
use crate::executor::{HttpExecutor, RequestOutcome};
use crate::runner::DEFAULT_RESPONSE_TIME_THRESHOLD;

/// One declarative request with the status it must answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub method: http::Method,
    /// Path (with query) relative to the base URL, or an absolute http(s) URL.
    pub path: String,
    pub expected_status: u16,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        method: http::Method,
        path: impl Into<String>,
        expected_status: u16,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            expected_status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteOptions {
    pub response_time_threshold: Duration,
    pub request_timeout: Option<Duration>,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            response_time_threshold: DEFAULT_RESPONSE_TIME_THRESHOLD,
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    /// Case name, also the metrics group it is recorded under.
    pub name: String,
    pub outcome: RequestOutcome,
    pub checks: Vec<CheckResult>,
}

pub fn case_checks(case: &TestCase, threshold: Duration) -> [Check; 2] {
    [
        Check::status_is(CHECK_STATUS_CODE_MATCHES, case.expected_status),
        Check::latency_under(CHECK_RESPONSE_TIME_UNDER_THRESHOLD, threshold),
    ]
}

pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Runs every case once, strictly in order, one request in flight at a time.
pub async fn run_all<E: HttpExecutor>(
    executor: &E,
    base_url: &str,
    cases: &[TestCase],
    opts: &SuiteOptions,
) -> Vec<CaseReport> {
    let mut reports = Vec::with_capacity(cases.len());
    for case in cases {
        let req = HttpRequest::new(case.method.clone(), join_url(base_url, &case.path))
            .with_timeout(opts.request_timeout);
        let outcome = executor.execute(req).await;
        let checks = evaluate(&outcome, &case_checks(case, opts.response_time_threshold));

        reports.push(CaseReport {
            name: case.name.clone(),
            outcome,
            checks,
        });
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use stampede_http::HttpTransportErrorKind;

    #[derive(Debug, Clone)]
    struct Fixed(RequestOutcome);

    impl HttpExecutor for Fixed {
        async fn execute(&self, _req: HttpRequest) -> RequestOutcome {
            self.0.clone()
        }
    }

    #[derive(Debug, Default)]
    struct Recording {
        seen: Mutex<Vec<(http::Method, String)>>,
    }

    impl HttpExecutor for Recording {
        async fn execute(&self, req: HttpRequest) -> RequestOutcome {
            self.seen.lock().push((req.method, req.url));
            RequestOutcome::response(200, Duration::from_millis(1), "")
        }
    }

    fn passed(report: &CaseReport) -> Vec<(&str, bool)> {
        report
            .checks
            .iter()
            .map(|c| (&*c.name, c.passed))
            .collect()
    }

    #[tokio::test]
    async fn listing_products_within_threshold_passes_both_checks() {
        let exec = Fixed(RequestOutcome::response(
            200,
            Duration::from_millis(500),
            "[]",
        ));
        let cases = [TestCase::new(
            "List Products - Success",
            http::Method::GET,
            "/products",
            200,
        )];

        let reports = run_all(&exec, "http://x", &cases, &SuiteOptions::default()).await;

        assert_eq!(reports.len(), 1);
        assert_eq!(
            passed(&reports[0]),
            vec![
                ("status-code-matches", true),
                ("response-time-under-threshold", true)
            ]
        );
    }

    #[tokio::test]
    async fn expected_client_error_counts_as_a_match() {
        let exec = Fixed(RequestOutcome::response(
            400,
            Duration::from_millis(20),
            "{}",
        ));
        let cases = [TestCase::new(
            "Invalid Sort Order",
            http::Method::GET,
            "/products?sort=ascending",
            400,
        )];

        let reports = run_all(&exec, "http://x", &cases, &SuiteOptions::default()).await;
        assert_eq!(passed(&reports[0])[0], ("status-code-matches", true));
    }

    #[tokio::test]
    async fn fixed_outcome_yields_results_in_case_order() {
        let exec = Fixed(RequestOutcome::response(
            404,
            Duration::from_millis(1500),
            "",
        ));
        let cases = [
            TestCase::new("first", http::Method::GET, "/products", 200),
            TestCase::new("second", http::Method::GET, "/productss", 404),
            TestCase::new("third", http::Method::DELETE, "/products", 405),
        ];

        let reports = run_all(&exec, "http://x", &cases, &SuiteOptions::default()).await;

        let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(
            passed(&reports[0]),
            vec![
                ("status-code-matches", false),
                ("response-time-under-threshold", false)
            ]
        );
        assert_eq!(
            passed(&reports[1]),
            vec![
                ("status-code-matches", true),
                ("response-time-under-threshold", false)
            ]
        );
        assert_eq!(passed(&reports[2])[0], ("status-code-matches", false));
    }

    #[tokio::test]
    async fn transport_failure_fails_every_check_without_panicking() {
        let exec = Fixed(RequestOutcome::transport_failure(
            HttpTransportErrorKind::Connect,
            "connection refused",
            Duration::from_millis(1),
        ));
        let cases = [TestCase::new("down", http::Method::GET, "/products", 200)];

        let reports = run_all(&exec, "http://x", &cases, &SuiteOptions::default()).await;
        assert!(reports[0].checks.iter().all(|c| !c.passed));
        assert_eq!(reports[0].checks.len(), 2);
    }

    #[tokio::test]
    async fn sentinel_status_without_failure_detail_fails_both_checks() {
        let exec = Fixed(RequestOutcome::response(0, Duration::from_millis(5), ""));
        let cases = [TestCase::new("down", http::Method::GET, "/products", 200)];

        let reports = run_all(&exec, "http://x", &cases, &SuiteOptions::default()).await;
        assert_eq!(
            passed(&reports[0]),
            vec![
                ("status-code-matches", false),
                ("response-time-under-threshold", false)
            ]
        );
    }

    #[tokio::test]
    async fn requests_use_case_method_and_joined_url() {
        let exec = Recording::default();
        let cases = [
            TestCase::new("a", http::Method::GET, "/products?limit=5", 200),
            TestCase::new("b", http::Method::PUT, "products", 405),
        ];

        run_all(&exec, "http://store/", &cases, &SuiteOptions::default()).await;

        let seen = exec.seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                (http::Method::GET, "http://store/products?limit=5".to_string()),
                (http::Method::PUT, "http://store/products".to_string()),
            ]
        );
    }

    #[test]
    fn absolute_case_urls_are_used_verbatim() {
        assert_eq!(
            join_url("http://store", "https://other/products"),
            "https://other/products"
        );
    }
}
