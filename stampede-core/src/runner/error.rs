pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("target unreachable at {url}: {reason}")]
    TargetUnreachable { url: String, reason: String },

    #[error("scheduler invariant violated: {0}")]
    Invariant(String),

    #[error("report rendering failed: {0}")]
    Finalize(String),

    #[error("invalid output path: `{0}`")]
    InvalidOutputPath(String),
}

impl Error {
    /// True for failures caused by what the user handed us rather than by the run itself.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::InvalidOutputPath(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("`baseUrl` must be an absolute http:// or https:// URL, got `{0}`")]
    InvalidBaseUrl(String),

    #[error("`tests` must be a non-empty list of test cases")]
    EmptyTests,

    #[error("test case #{0} has an empty name")]
    EmptyTestName(usize),

    #[error("test case `{name}`: unsupported http method `{method}`")]
    UnsupportedMethod { name: String, method: String },

    #[error("test case `{name}`: expected status {status} is outside 100..=599")]
    InvalidExpectedStatus { name: String, status: u16 },

    #[error("`stages` must be a non-empty array of {{ duration, target }}")]
    EmptyStages,

    #[error("`stages` must add up to a positive total duration")]
    ZeroRampDuration,

    #[error("`tick` must be a positive duration")]
    InvalidTick,

    #[error("`probes.path` must start with `/`, got `{0}`")]
    InvalidProbePath(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_invalid_input_but_unreachable_target_is_not() {
        assert!(Error::InvalidConfig(ConfigError::EmptyTests).is_invalid_input());
        assert!(Error::InvalidOutputPath("../x".to_string()).is_invalid_input());
        assert!(
            !Error::TargetUnreachable {
                url: "http://127.0.0.1:1/products".to_string(),
                reason: "connect".to_string(),
            }
            .is_invalid_input()
        );
        assert!(!Error::Invariant("3 workers for target 2".to_string()).is_invalid_input());
    }

    #[test]
    fn messages_name_the_offending_key() {
        let err = Error::from(ConfigError::InvalidExpectedStatus {
            name: "List Products".to_string(),
            status: 700,
        });
        let msg = err.to_string();
        assert!(msg.contains("List Products"));
        assert!(msg.contains("700"));
    }
}
