//! # Task Run Results
//!
//! The outcome classification every activity run must produce. This enum is
//! the sole signal the external scheduler uses to decide whether to
//! reschedule, leave suspended, or mark fatally failed, so it is produced on
//! every exit path, including exceptional ones.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one activity or task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunResult {
    /// Run completed; recurring tasks are still rescheduled by the external
    /// trigger
    Finished,
    /// Failed in a way that requires operator intervention; never retried
    /// automatically
    PermanentError,
    /// Failed transiently; the scheduler should retry with backoff
    TemporaryError,
    /// A cooperative stop was requested; always safely resumable
    Interrupted,
    /// Explicit pause, e.g. awaiting external approval or a bucket held live
    /// by another node; not an error
    Waiting,
}

impl TaskRunResult {
    /// Check if this result ends the activity for good (no automatic retry)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::PermanentError)
    }

    /// Check if this result represents a failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::PermanentError | Self::TemporaryError)
    }

    /// Check if the scheduler should automatically run the task again
    pub fn should_reschedule(&self) -> bool {
        matches!(self, Self::TemporaryError | Self::Interrupted)
    }

    /// Severity rank used when merging outcomes of concurrent workers
    fn severity(&self) -> u8 {
        match self {
            Self::Finished => 0,
            Self::Waiting => 1,
            Self::Interrupted => 2,
            Self::TemporaryError => 3,
            Self::PermanentError => 4,
        }
    }

    /// Merge two concurrent worker outcomes, keeping the more severe one
    pub fn merge(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Classify an internal error into the result the scheduler sees.
    ///
    /// Total by construction: every error maps to exactly one result, so a
    /// run can always report an outcome even on exceptional exit paths.
    pub fn from_error(error: &CoreError) -> Self {
        match error {
            CoreError::ConfigurationError(_)
            | CoreError::SchemaError(_)
            | CoreError::HandlerPermanentError(_)
            | CoreError::StateError(_) => Self::PermanentError,
            CoreError::TransientStoreError(_) | CoreError::HandlerTemporaryError(_) => {
                Self::TemporaryError
            }
            CoreError::Interrupted(_) => Self::Interrupted,
        }
    }
}

impl fmt::Display for TaskRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::PermanentError => write!(f, "permanent_error"),
            Self::TemporaryError => write!(f, "temporary_error"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Waiting => write!(f, "waiting"),
        }
    }
}

impl std::str::FromStr for TaskRunResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "finished" => Ok(Self::Finished),
            "permanent_error" => Ok(Self::PermanentError),
            "temporary_error" => Ok(Self::TemporaryError),
            "interrupted" => Ok(Self::Interrupted),
            "waiting" => Ok(Self::Waiting),
            _ => Err(format!("Invalid task run result: {s}")),
        }
    }
}
