use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use crate::executor::RequestOutcome;

pub const CHECK_STATUS_CODE_MATCHES: &str = "status-code-matches";
pub const CHECK_RESPONSE_TIME_UNDER_THRESHOLD: &str = "response-time-under-threshold";
pub const CHECK_STATUS_IS_200: &str = "status-is-200";

type Predicate = Arc<dyn Fn(&RequestOutcome) -> bool + Send + Sync + 'static>;

/// A named predicate over one outcome.
#[derive(Clone)]
pub struct Check {
    name: Arc<str>,
    predicate: Predicate,
}

impl Check {
    pub fn new<F>(name: impl Into<Arc<str>>, predicate: F) -> Self
    where
        F: Fn(&RequestOutcome) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exact status comparison. The transport sentinel never matches a real status.
    pub fn status_is(name: impl Into<Arc<str>>, expected: u16) -> Self {
        Self::new(name, move |o| {
            !o.is_transport_failure() && o.status == expected
        })
    }

    /// Latency strictly below `threshold`. A transport failure never passes.
    pub fn latency_under(name: impl Into<Arc<str>>, threshold: Duration) -> Self {
        Self::new(name, move |o| {
            !o.is_transport_failure() && o.latency < threshold
        })
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: Arc<str>,
    pub passed: bool,
}

/// Evaluates every check in order. A predicate that panics counts as failed.
pub fn evaluate(outcome: &RequestOutcome, checks: &[Check]) -> Vec<CheckResult> {
    checks
        .iter()
        .map(|check| {
            let passed = match catch_unwind(AssertUnwindSafe(|| (check.predicate)(outcome))) {
                Ok(passed) => passed,
                Err(_) => {
                    tracing::warn!(check = %check.name, "check predicate panicked");
                    false
                }
            };
            CheckResult {
                name: check.name.clone(),
                passed,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_http::HttpTransportErrorKind;

    fn ok(status: u16, ms: u64) -> RequestOutcome {
        RequestOutcome::response(status, Duration::from_millis(ms), "")
    }

    #[test]
    fn results_keep_check_order() {
        let checks = [
            Check::new("b", |_| true),
            Check::new("a", |_| false),
            Check::new("c", |o| o.status == 201),
        ];
        let res = evaluate(&ok(201, 1), &checks);
        let got: Vec<(&str, bool)> = res.iter().map(|r| (&*r.name, r.passed)).collect();
        assert_eq!(got, vec![("b", true), ("a", false), ("c", true)]);
    }

    #[test]
    fn panicking_predicate_is_recorded_as_failed() {
        let checks = [
            Check::new("boom", |_| panic!("predicate bug")),
            Check::new("after", |_| true),
        ];
        let res = evaluate(&ok(200, 1), &checks);
        assert!(!res[0].passed);
        assert!(res[1].passed);
    }

    #[test]
    fn latency_threshold_is_strict() {
        let check = Check::latency_under("rt", Duration::from_millis(1000));
        assert!(evaluate(&ok(200, 999), std::slice::from_ref(&check))[0].passed);
        assert!(!evaluate(&ok(200, 1000), std::slice::from_ref(&check))[0].passed);
    }

    #[test]
    fn builtin_checks_fail_on_transport_failure() {
        let outcome = RequestOutcome::transport_failure(
            HttpTransportErrorKind::Timeout,
            "timed out",
            Duration::ZERO,
        );
        let checks = [
            Check::status_is("status", 0),
            Check::latency_under("rt", Duration::from_secs(1)),
        ];
        assert!(evaluate(&outcome, &checks).iter().all(|r| !r.passed));
    }
}
