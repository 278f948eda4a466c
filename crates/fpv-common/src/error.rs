use std::fmt;

/// Configuration-loading failures. Matches `ConfigError` usage: most call sites
/// downgrade `Missing`/`Invalid` to a logged default rather than propagating.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required key [{section}].{key}")]
    Missing { section: String, key: String },

    #[error("invalid value for [{section}].{key}: {value:?}")]
    Invalid {
        section: String,
        key: String,
        value: String,
    },

    #[error("io error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure invoking an external capability (route/qos/process utility).
/// Carries enough of the failed invocation for logging; callers never match
/// on the variant for control flow, only for the retry-next-tick message.
#[derive(Debug, thiserror::Error)]
pub struct CapabilityError {
    pub command: String,
    pub args: Vec<String>,
    pub detail: CapabilityFailure,
}

#[derive(Debug)]
pub enum CapabilityFailure {
    Spawn(std::io::Error),
    NonZeroExit(i32),
    Signaled,
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "capability invocation failed: {} {} ({:?})",
            self.command,
            self.args.join(" "),
            self.detail
        )
    }
}
