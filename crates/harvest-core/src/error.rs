//! Core domain errors and error classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of the error that settled a task.
///
/// Recorded on [`crate::ExecutionStats`] so reports can distinguish a
/// missing extractor from one that ran and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The backing unit could not be resolved. Never retried.
    Load,
    /// The unit ran and reported a failure. Retried per policy.
    Execution,
    /// An attempt exceeded its deadline. Retried per policy.
    Timeout,
    /// Run-level cancellation was observed. Never retried.
    Cancelled,
}

impl ErrorKind {
    /// Returns true if a failure of this kind is eligible for retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution | Self::Timeout)
    }
}

/// Errors resolving a task's backing work unit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// No entry point for the task exists in the unit catalog, or the
    /// backing resource is missing on disk.
    #[error("Unit not found for task '{task}': {detail}")]
    UnitNotFound { task: String, detail: String },

    /// The backing resource exists but failed to initialize.
    #[error("Unit for task '{task}' is invalid: {detail}")]
    UnitInvalid { task: String, detail: String },
}

impl LoadError {
    /// Create a not-found error.
    pub fn not_found(task: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnitNotFound {
            task: task.into(),
            detail: detail.into(),
        }
    }

    /// Create an invalid-unit error.
    pub fn invalid(task: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnitInvalid {
            task: task.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Execution.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Load.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::not_found("git", "no entry point");
        assert!(err.to_string().contains("git"));
        assert!(err.to_string().contains("no entry point"));
    }
}
