//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, RewindError>;

/// Errors raised by the session model, its derived operations and the store.
#[derive(Debug, Error)]
pub enum RewindError {
    /// Branching was attempted on a session with no steps.
    #[error("cannot branch from empty session '{name}'")]
    EmptySession { name: String },

    /// A step position outside `[0, total_steps - 1]` was requested.
    #[error("step {requested} is out of range for session '{session}' (valid: 0-{max})")]
    OutOfRange {
        session: String,
        requested: i64,
        max: usize,
    },

    /// A step was requested from a session that has none to offer.
    #[error("session '{0}' has no steps")]
    NoSteps(String),

    /// A breakpoint pattern failed to compile.
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A breakpoint was created with no condition at all.
    #[error("at least one of step number, pattern, or on-error must be set")]
    MissingCondition,

    /// A session or breakpoint reference did not resolve.
    #[error("{0} not found")]
    NotFound(String),

    /// A persisted row could not be decoded.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// The config file is not valid TOML for [`crate::config::Config`].
    #[error("invalid config file {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RewindError {
    /// True for failures that mean "the requested step state does not exist".
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::NoSteps(_))
    }
}
