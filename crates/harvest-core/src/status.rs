//! Status enum for task execution.

use serde::{Deserialize, Serialize};

/// State of a task as it moves through the executor's retry machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Task registered but not yet started.
    #[default]
    Pending,
    /// An attempt is currently in flight.
    Running,
    /// Last attempt failed; waiting out the retry delay.
    Retrying,
    /// Task completed successfully.
    Succeeded,
    /// Task exhausted its retries or hit a non-retryable error.
    Failed,
    /// Task observed run-level cancellation before settling.
    Cancelled,
}

impl TaskState {
    /// Returns true if the task has settled (no further attempts will run).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the task is still pending or in flight.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}
