//! Task specifications.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Immutable description of one registered task.
///
/// The `name` is the unique key joining a spec to its statistics and its
/// artifact file. Policy fields (retries, delay, timeout, priority) are
/// fixed at registry construction and never change mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique task name.
    pub name: String,

    /// Path to the backing extractor resource, relative to the fleet root.
    pub script: PathBuf,

    /// Configured entry-point name; the loader probes this first.
    pub entry_point: String,

    /// Maximum retries after the first attempt.
    pub max_retries: u32,

    /// Delay between a failed attempt and the next one.
    pub retry_delay: Duration,

    /// Deadline for each individual attempt.
    pub timeout: Duration,

    /// Disabled tasks are skipped by `run-all` but still listable.
    pub enabled: bool,

    /// Start-order priority; lower values start first.
    pub priority: i32,
}

impl TaskSpec {
    /// Create a spec with default policy values.
    pub fn new(
        name: impl Into<String>,
        script: impl Into<PathBuf>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            entry_point: entry_point.into(),
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
            enabled: true,
            priority: 10,
        }
    }

    /// Builder method to set the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Builder method to set the inter-retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Builder method to set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the start-order priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method to enable or disable the task.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Total number of attempts this spec allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Conventional artifact file name for this task.
    pub fn artifact_file(&self) -> String {
        format!("{}_info.json", self.name)
    }
}
