//! Per-run execution context.

use chrono::{DateTime, Utc};
use harvest_core::ExecutionStats;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// State owned by one orchestration run.
///
/// Replaces any ambient process-wide state: the cancellation token and the
/// settled-stats map live here and die with the run. Each task name is
/// written at most once, by the single worker that executed that task.
pub struct RunContext {
    /// When this run started.
    pub started_at: DateTime<Utc>,

    /// Run-level cancellation signal, observed cooperatively by workers.
    cancel: CancellationToken,

    /// Settled statistics, keyed by task name.
    stats: Mutex<HashMap<String, ExecutionStats>>,
}

impl RunContext {
    /// Create a new run context wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            stats: Mutex::new(HashMap::new()),
        })
    }

    /// The run's cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cooperative cancellation of the whole run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true if run-level cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record a task's settled statistics.
    pub async fn record(&self, stats: ExecutionStats) {
        self.stats.lock().await.insert(stats.name.clone(), stats);
    }

    /// Snapshot all settled statistics recorded so far.
    pub async fn settled_stats(&self) -> Vec<ExecutionStats> {
        self.stats.lock().await.values().cloned().collect()
    }

    /// Number of tasks that have settled.
    pub async fn settled_count(&self) -> usize {
        self.stats.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_snapshot() {
        let ctx = RunContext::new();
        let mut stats = ExecutionStats::begin("git");
        stats.start_attempt();
        stats.succeed();
        ctx.record(stats).await;

        assert_eq!(ctx.settled_count().await, 1);
        let all = ctx.settled_stats().await;
        assert_eq!(all[0].name, "git");
    }

    #[tokio::test]
    async fn test_cancel_flag() {
        let ctx = RunContext::new();
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert!(ctx.cancellation_token().is_cancelled());
    }
}
