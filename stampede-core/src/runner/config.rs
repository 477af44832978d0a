use std::time::Duration;

use crate::cases::TestCase;

use super::error::ConfigError;

pub const DEFAULT_RESPONSE_TIME_THRESHOLD: Duration = Duration::from_millis(1000);
pub const DEFAULT_LOAD_THRESHOLD: Duration = Duration::from_millis(800);
pub const DEFAULT_THINK_TIME: Duration = Duration::from_secs(1);
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
pub const DEFAULT_PROBE_PATH: &str = "/products";

const SUPPORTED_METHODS: [http::Method; 7] = [
    http::Method::GET,
    http::Method::POST,
    http::Method::PUT,
    http::Method::PATCH,
    http::Method::DELETE,
    http::Method::HEAD,
    http::Method::OPTIONS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    #[must_use]
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// What to do when the preflight request cannot reach the target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum OnUnreachable {
    #[default]
    Abort,
    Continue,
}

/// The two GET requests every iteration sends after the suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub path: String,
    /// Latency bound for the `load` probe.
    pub load_threshold: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PROBE_PATH.to_string(),
            load_threshold: DEFAULT_LOAD_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    pub tests: Vec<TestCase>,
    pub stages: Vec<Stage>,
    pub probes: ProbeConfig,
    pub response_time_threshold: Duration,
    pub request_timeout: Option<Duration>,
    pub think_time: Duration,
    /// Scheduler reconciliation interval.
    pub tick: Duration,
    pub on_unreachable: OnUnreachable,
}

impl RunConfig {
    pub fn new(base_url: impl Into<String>, tests: Vec<TestCase>, stages: Vec<Stage>) -> Self {
        Self {
            base_url: base_url.into(),
            tests,
            stages,
            probes: ProbeConfig::default(),
            response_time_threshold: DEFAULT_RESPONSE_TIME_THRESHOLD,
            request_timeout: None,
            think_time: DEFAULT_THINK_TIME,
            tick: DEFAULT_TICK,
            on_unreachable: OnUnreachable::default(),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration))
    }

    pub fn max_target(&self) -> u64 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Checks everything that must hold before a single worker is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_ok = url::Url::parse(&self.base_url)
            .ok()
            .is_some_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host());
        if !base_ok {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        if self.tests.is_empty() {
            return Err(ConfigError::EmptyTests);
        }
        for (idx, case) in self.tests.iter().enumerate() {
            if case.name.trim().is_empty() {
                return Err(ConfigError::EmptyTestName(idx + 1));
            }
            if !SUPPORTED_METHODS.contains(&case.method) {
                return Err(ConfigError::UnsupportedMethod {
                    name: case.name.clone(),
                    method: case.method.to_string(),
                });
            }
            if !(100..=599).contains(&case.expected_status) {
                return Err(ConfigError::InvalidExpectedStatus {
                    name: case.name.clone(),
                    status: case.expected_status,
                });
            }
        }

        if self.stages.is_empty() {
            return Err(ConfigError::EmptyStages);
        }
        if self.total_duration().is_zero() {
            return Err(ConfigError::ZeroRampDuration);
        }
        if self.tick.is_zero() {
            return Err(ConfigError::InvalidTick);
        }
        if !self.probes.path.starts_with('/') {
            return Err(ConfigError::InvalidProbePath(self.probes.path.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RunConfig {
        RunConfig::new(
            "https://fakestoreapi.com",
            vec![TestCase::new(
                "List Products - Success",
                http::Method::GET,
                "/products",
                200,
            )],
            vec![
                Stage::new(Duration::from_secs(5), 1),
                Stage::new(Duration::from_secs(10), 10),
            ],
        )
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = valid();
        assert_eq!(cfg.response_time_threshold, Duration::from_millis(1000));
        assert_eq!(cfg.probes.load_threshold, Duration::from_millis(800));
        assert_eq!(cfg.probes.path, "/products");
        assert_eq!(cfg.think_time, Duration::from_secs(1));
        assert_eq!(cfg.tick, Duration::from_millis(100));
        assert_eq!(cfg.on_unreachable, OnUnreachable::Abort);
        assert_eq!(cfg.total_duration(), Duration::from_secs(15));
        assert_eq!(cfg.max_target(), 10);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut cfg = valid();
        cfg.base_url = "ftp://fakestoreapi.com".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBaseUrl(_))
        ));

        cfg.base_url = "fakestoreapi.com".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn rejects_empty_lists() {
        let mut cfg = valid();
        cfg.tests.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyTests));

        let mut cfg = valid();
        cfg.stages.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyStages));
    }

    #[test]
    fn rejects_all_zero_stage_durations() {
        let mut cfg = valid();
        cfg.stages = vec![Stage::new(Duration::ZERO, 3)];
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroRampDuration));
    }

    #[test]
    fn rejects_out_of_range_status_and_unknown_methods() {
        let mut cfg = valid();
        cfg.tests[0].expected_status = 42;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidExpectedStatus { status: 42, .. })
        ));

        let mut cfg = valid();
        cfg.tests[0].method = http::Method::from_bytes(b"FETCH").unwrap_or(http::Method::GET);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn on_unreachable_parses_from_kebab_case() {
        assert_eq!("abort".parse::<OnUnreachable>(), Ok(OnUnreachable::Abort));
        assert_eq!(
            "continue".parse::<OnUnreachable>(),
            Ok(OnUnreachable::Continue)
        );
        assert!("ignore".parse::<OnUnreachable>().is_err());
    }
}
