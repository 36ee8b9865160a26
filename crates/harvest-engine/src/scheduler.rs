//! Bounded-concurrency scheduling of many tasks.

use crate::context::RunContext;
use crate::executor::Executor;
use harvest_core::{ExecutionStats, TaskSpec};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Default concurrency bound for a run.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Runs many tasks under a global concurrency bound.
pub struct Scheduler {
    executor: Executor,
}

impl Scheduler {
    /// Create a scheduler dispatching to the given executor.
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Run a set of tasks, at most `max_concurrent` at a time.
    ///
    /// Tasks are started in ascending priority order (ties keep the given
    /// order) by acquiring a worker slot before each spawn. Start order is
    /// a best-effort heuristic only; completion order is unconstrained.
    /// One task's failure or panic never disturbs the others, and the
    /// returned map always covers every given spec. On run-level
    /// cancellation, tasks still waiting for a slot settle as Cancelled
    /// without starting.
    pub async fn run_many(
        &self,
        specs: Vec<TaskSpec>,
        max_concurrent: usize,
        ctx: &Arc<RunContext>,
    ) -> BTreeMap<String, ExecutionStats> {
        let max_concurrent = max_concurrent.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut outcomes = BTreeMap::new();
        let mut workers: JoinSet<ExecutionStats> = JoinSet::new();

        let mut ordered = specs;
        // Stable sort: ties keep registry insertion order.
        ordered.sort_by_key(|s| s.priority);

        info!(
            tasks = ordered.len(),
            max_concurrent,
            "Starting run"
        );

        for spec in ordered {
            // Acquire the slot before spawning so that tasks start in
            // priority order. The semaphore is never closed, so a failed
            // acquire can only mean the race below picked cancellation.
            let permit = tokio::select! {
                _ = ctx.cancellation_token().cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                info!(task = %spec.name, "Run cancelled before task acquired a slot");
                let mut stats = ExecutionStats::begin(&spec.name);
                stats.cancel();
                ctx.record(stats.clone()).await;
                outcomes.insert(stats.name.clone(), stats);
                continue;
            };

            let executor = self.executor.clone();
            let ctx = ctx.clone();
            workers.spawn(async move {
                let stats = executor.execute(&spec, &ctx).await;
                drop(permit);
                ctx.record(stats.clone()).await;
                stats
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stats) => {
                    outcomes.insert(stats.name.clone(), stats);
                }
                Err(err) => {
                    // A panicking unit loses its own stats but must not
                    // disturb the rest of the run.
                    warn!(error = %err, "Task worker panicked");
                }
            }
        }

        let succeeded = outcomes.values().filter(|s| s.success).count();
        info!(
            tasks = outcomes.len(),
            succeeded,
            failed = outcomes.len() - succeeded,
            "Run settled"
        );

        outcomes
    }
}
