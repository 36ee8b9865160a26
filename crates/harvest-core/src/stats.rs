//! Per-task execution statistics.

use crate::{ErrorKind, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics for one task in one run.
///
/// Created when the task begins, mutated only by the worker executing that
/// task, and read-only once the task settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Task name (join key to the spec and artifact).
    pub name: String,

    /// Current state; terminal once the task settles.
    pub state: TaskState,

    /// When execution of this task began.
    pub started_at: DateTime<Utc>,

    /// When the task settled, if it has.
    pub finished_at: Option<DateTime<Utc>>,

    /// Wall-clock duration in milliseconds, once settled.
    pub duration_ms: Option<i64>,

    /// Number of invocation attempts actually made.
    pub attempts: u32,

    /// True iff the task settled as Succeeded.
    pub success: bool,

    /// Message from the last failed attempt, if any.
    pub last_error: Option<String>,

    /// Classification of the error that settled the task, if any.
    pub error_kind: Option<ErrorKind>,

    /// Size of the task's artifact on disk, filled in by the aggregator.
    pub artifact_bytes: Option<u64>,
}

impl ExecutionStats {
    /// Create stats for a task that is about to run.
    pub fn begin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TaskState::Pending,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            attempts: 0,
            success: false,
            last_error: None,
            error_kind: None,
            artifact_bytes: None,
        }
    }

    /// Record the start of an invocation attempt.
    pub fn start_attempt(&mut self) {
        self.state = TaskState::Running;
        self.attempts += 1;
    }

    /// Record a failed attempt that will be retried.
    pub fn record_retry(&mut self, kind: ErrorKind, error: impl Into<String>) {
        self.state = TaskState::Retrying;
        self.last_error = Some(error.into());
        self.error_kind = Some(kind);
    }

    /// Settle the task as succeeded.
    pub fn succeed(&mut self) {
        self.state = TaskState::Succeeded;
        self.success = true;
        self.finalize();
    }

    /// Settle the task as failed with a classified error.
    pub fn fail(&mut self, kind: ErrorKind, error: impl Into<String>) {
        self.state = TaskState::Failed;
        self.last_error = Some(error.into());
        self.error_kind = Some(kind);
        self.finalize();
    }

    /// Settle the task as cancelled.
    pub fn cancel(&mut self) {
        self.state = TaskState::Cancelled;
        self.error_kind = Some(ErrorKind::Cancelled);
        self.finalize();
    }

    fn finalize(&mut self) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds());
    }

    /// Returns true if the task has settled.
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal()
    }
}
