#![forbid(unsafe_code)]

mod cases;
mod check;
mod executor;

pub mod runner;

pub use cases::{CaseReport, SuiteOptions, TestCase, case_checks, join_url, run_all};
pub use check::{
    CHECK_RESPONSE_TIME_UNDER_THRESHOLD, CHECK_STATUS_CODE_MATCHES, CHECK_STATUS_IS_200, Check,
    CheckResult, evaluate,
};
pub use executor::{HttpExecutor, RequestOutcome, TRANSPORT_FAILURE_STATUS, TransportFailure};
pub use stampede_http::{HttpClient, HttpRequest, HttpResponse, HttpTransportErrorKind};
