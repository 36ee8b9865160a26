//! Combined run reports.

use crate::{ExecutionStats, RunId, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate outcome of one orchestration run.
///
/// Immutable once built. Task stats are keyed by name in a sorted map so
/// two reports over the same inputs serialize identically apart from
/// `run_id` and `generated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of the run this report describes.
    pub run_id: RunId,

    /// When the report was generated.
    pub generated_at: DateTime<Utc>,

    /// Number of tasks that settled Succeeded.
    pub succeeded: usize,

    /// Number of tasks that settled Failed.
    pub failed: usize,

    /// Number of tasks that settled Cancelled.
    pub cancelled: usize,

    /// Number of tasks with an artifact present on disk.
    pub artifacts_collected: usize,

    /// Sum of all per-task wall-clock durations, in milliseconds.
    pub total_duration_ms: i64,

    /// Sum of all artifact sizes on disk, in bytes.
    pub total_artifact_bytes: u64,

    /// Per-task statistics, keyed by task name.
    pub tasks: BTreeMap<String, ExecutionStats>,
}

impl RunReport {
    /// Build a report from settled per-task statistics.
    ///
    /// Counts are derived from the stats themselves; `artifacts_collected`
    /// and `total_artifact_bytes` come from whatever `artifact_bytes` the
    /// caller filled in beforehand.
    pub fn from_stats(stats: impl IntoIterator<Item = ExecutionStats>) -> Self {
        let tasks: BTreeMap<String, ExecutionStats> =
            stats.into_iter().map(|s| (s.name.clone(), s)).collect();

        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        let mut artifacts_collected = 0;
        let mut total_duration_ms = 0i64;
        let mut total_artifact_bytes = 0u64;

        for stats in tasks.values() {
            match stats.state {
                TaskState::Succeeded => succeeded += 1,
                TaskState::Cancelled => cancelled += 1,
                _ => failed += 1,
            }
            if let Some(bytes) = stats.artifact_bytes {
                artifacts_collected += 1;
                total_artifact_bytes += bytes;
            }
            total_duration_ms += stats.duration_ms.unwrap_or(0);
        }

        Self {
            run_id: RunId::generate(),
            generated_at: Utc::now(),
            succeeded,
            failed,
            cancelled,
            artifacts_collected,
            total_duration_ms,
            total_artifact_bytes,
            tasks,
        }
    }

    /// Total number of tasks covered by this report.
    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }
}
