use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// No supplier/handler registered for a requested work type, or an
    /// invalid engine configuration value. A deployment bug, not a data
    /// error; never retried.
    ConfigurationError(String),
    /// A persisted configuration blob, activity path, or partition parameter
    /// is structurally invalid. Fatal for that task instance.
    SchemaError(String),
    /// The shared object store is temporarily unreachable. Retryable.
    TransientStoreError(String),
    /// A pluggable handler failed and declared the failure permanent.
    HandlerPermanentError(String),
    /// A pluggable handler failed and declared the failure temporary.
    HandlerTemporaryError(String),
    /// A cooperative stop was requested. Not a failure; always resumable.
    Interrupted(String),
    /// An operation violated the execution state machine, e.g. purging state
    /// under a live lease.
    StateError(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            CoreError::SchemaError(msg) => write!(f, "Schema error: {msg}"),
            CoreError::TransientStoreError(msg) => write!(f, "Transient store error: {msg}"),
            CoreError::HandlerPermanentError(msg) => write!(f, "Handler error (permanent): {msg}"),
            CoreError::HandlerTemporaryError(msg) => write!(f, "Handler error (temporary): {msg}"),
            CoreError::Interrupted(msg) => write!(f, "Interrupted: {msg}"),
            CoreError::StateError(msg) => write!(f, "State error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl CoreError {
    /// True when the scheduler may retry the failed run with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::TransientStoreError(_) | CoreError::HandlerTemporaryError(_)
        )
    }

    /// True when the error represents a cooperative stop rather than a
    /// failure.
    pub fn is_interruption(&self) -> bool {
        matches!(self, CoreError::Interrupted(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SchemaError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
