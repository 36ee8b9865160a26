//! Per-task execution: the retry/timeout state machine.

use crate::context::RunContext;
use crate::loader::Loader;
use crate::unit::WorkUnit;
use harvest_core::{ErrorKind, ExecutionStats, TaskSpec};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a single invocation attempt.
enum AttemptOutcome {
    Success,
    Failed(ErrorKind, String),
    Cancelled,
}

/// Runs one task through load, bounded attempts, and retry delays.
///
/// All failures are contained: `execute` always returns settled stats and
/// never an error, so one task can never take down its siblings or the
/// scheduler.
#[derive(Clone)]
pub struct Executor {
    loader: Loader,
}

impl Executor {
    /// Create an executor resolving units through the given loader.
    pub fn new(loader: Loader) -> Self {
        Self { loader }
    }

    /// Execute a task to a terminal state.
    ///
    /// Attempts are bounded by `spec.max_attempts()`; each attempt gets a
    /// fresh timeout clock. Load failures are not retried - a missing
    /// resource will not appear between attempts - and count as the single
    /// attempt. Cancellation is observed before each attempt, during the
    /// retry-delay sleep, and raced against the in-flight attempt.
    pub async fn execute(&self, spec: &TaskSpec, ctx: &RunContext) -> ExecutionStats {
        let mut stats = ExecutionStats::begin(&spec.name);

        if ctx.is_cancelled() {
            info!(task = %spec.name, "Run cancelled before task started");
            stats.cancel();
            return stats;
        }

        let loaded = match self.loader.load(spec) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(task = %spec.name, error = %err, "Unit failed to load");
                stats.start_attempt();
                stats.fail(ErrorKind::Load, err.to_string());
                return stats;
            }
        };

        loop {
            stats.start_attempt();
            info!(
                task = %spec.name,
                attempt = stats.attempts,
                max_attempts = spec.max_attempts(),
                "Starting attempt"
            );

            match self.run_attempt(spec, &loaded.unit, ctx).await {
                AttemptOutcome::Success => {
                    info!(task = %spec.name, attempts = stats.attempts, "Task succeeded");
                    stats.succeed();
                    return stats;
                }
                AttemptOutcome::Cancelled => {
                    info!(task = %spec.name, "Task cancelled mid-attempt");
                    stats.cancel();
                    return stats;
                }
                AttemptOutcome::Failed(kind, message) => {
                    let exhausted = stats.attempts >= spec.max_attempts();
                    if exhausted || !kind.is_retryable() {
                        warn!(
                            task = %spec.name,
                            attempts = stats.attempts,
                            kind = ?kind,
                            error = %message,
                            "Task failed"
                        );
                        stats.fail(kind, message);
                        return stats;
                    }

                    warn!(
                        task = %spec.name,
                        attempt = stats.attempts,
                        kind = ?kind,
                        error = %message,
                        retry_in = ?spec.retry_delay,
                        "Attempt failed, will retry"
                    );
                    stats.record_retry(kind, message);

                    tokio::select! {
                        _ = ctx.cancellation_token().cancelled() => {
                            info!(task = %spec.name, "Task cancelled during retry delay");
                            stats.cancel();
                            return stats;
                        }
                        _ = tokio::time::sleep(spec.retry_delay) => {}
                    }
                }
            }
        }
    }

    /// Run one attempt under the task's timeout, racing cancellation.
    async fn run_attempt(
        &self,
        spec: &TaskSpec,
        unit: &Arc<dyn WorkUnit>,
        ctx: &RunContext,
    ) -> AttemptOutcome {
        tokio::select! {
            _ = ctx.cancellation_token().cancelled() => AttemptOutcome::Cancelled,
            result = tokio::time::timeout(spec.timeout, unit.invoke()) => match result {
                Ok(Ok(())) => AttemptOutcome::Success,
                Ok(Err(err)) => AttemptOutcome::Failed(ErrorKind::Execution, err.to_string()),
                Err(_) => AttemptOutcome::Failed(
                    ErrorKind::Timeout,
                    format!("attempt exceeded timeout of {:?}", spec.timeout),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{FnUnit, UnitCatalog};
    use harvest_core::{LoadError, TaskState};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn executor_with(entry_point: &str, unit: Arc<dyn WorkUnit>) -> Executor {
        let mut catalog = UnitCatalog::new();
        catalog.register_unit(entry_point, unit);
        Executor::new(Loader::new(Arc::new(catalog)))
    }

    fn spec(name: &str, max_retries: u32) -> TaskSpec {
        TaskSpec::new(name, format!("{name}/main.py"), format!("scrape_{name}"))
            .with_max_retries(max_retries)
            .with_retry_delay(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_unit_exhausts_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let executor = executor_with(
            "scrape_c",
            FnUnit::shared(move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("always fails".into())
                }
            }),
        );

        let ctx = RunContext::new();
        let stats = executor.execute(&spec("c", 2), &ctx).await;

        assert_eq!(stats.state, TaskState::Failed);
        assert_eq!(stats.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.error_kind, Some(ErrorKind::Execution));
        assert_eq!(stats.last_error.as_deref(), Some("always fails"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let executor = executor_with(
            "scrape_b",
            FnUnit::shared(move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".into())
                    } else {
                        Ok(())
                    }
                }
            }),
        );

        let ctx = RunContext::new();
        let stats = executor.execute(&spec("b", 3), &ctx).await;

        assert_eq!(stats.state, TaskState::Succeeded);
        assert!(stats.success);
        assert_eq!(stats.attempts, 3);
    }

    #[tokio::test]
    async fn test_load_error_is_never_retried() {
        let mut catalog = UnitCatalog::new();
        catalog.register(
            "scrape_x",
            Arc::new(|task: &str| Err(LoadError::invalid(task, "module init blew up"))),
        );
        let executor = Executor::new(Loader::new(Arc::new(catalog)));

        let ctx = RunContext::new();
        let stats = executor.execute(&spec("x", 5), &ctx).await;

        assert_eq!(stats.state, TaskState::Failed);
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.error_kind, Some(ErrorKind::Load));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_settles_promptly() {
        let executor = executor_with(
            "scrape_d",
            FnUnit::shared(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }),
        );
        let spec = spec("d", 0).with_timeout(Duration::from_secs(1));

        let ctx = RunContext::new();
        let started = Instant::now();
        let stats = executor.execute(&spec, &ctx).await;

        assert_eq!(stats.state, TaskState::Failed);
        assert_eq!(stats.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(stats.attempts, 1);
        // Terminates on the timeout clock, not the unit's sleep.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clock_resets_per_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let executor = executor_with(
            "scrape_t",
            FnUnit::shared(move || {
                let c = c.clone();
                async move {
                    // First attempt overruns; second finishes in time.
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok(())
                }
            }),
        );
        let spec = spec("t", 1).with_timeout(Duration::from_secs(1));

        let ctx = RunContext::new();
        let stats = executor.execute(&spec, &ctx).await;

        assert_eq!(stats.state, TaskState::Succeeded);
        assert_eq!(stats.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let executor = executor_with(
            "scrape_e",
            FnUnit::shared(move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("fails".into())
                }
            }),
        );
        let spec = spec("e", 3).with_retry_delay(Duration::from_secs(60));

        let ctx = RunContext::new();
        let cancel_ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel_ctx.cancel();
        });

        let stats = executor.execute(&spec, &ctx).await;

        assert_eq!(stats.state, TaskState::Cancelled);
        // First attempt ran, no further attempts after the cancel.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.error_kind, Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_attempts() {
        let executor = executor_with("scrape_f", FnUnit::shared(|| async { Ok(()) }));
        let ctx = RunContext::new();
        ctx.cancel();

        let stats = executor.execute(&spec("f", 2), &ctx).await;
        assert_eq!(stats.state, TaskState::Cancelled);
        assert_eq!(stats.attempts, 0);
    }
}
