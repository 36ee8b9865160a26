//! Artifact collection and the combined report.
//!
//! Artifact presence is deliberately decoupled from the executor's
//! declared outcome: a task may settle Succeeded without writing its
//! artifact, and a failed task may leave a stale artifact behind. The
//! aggregator reports both signals as it finds them and rolls nothing
//! back.

use crate::context::RunContext;
use harvest_core::{ExecutionStats, RunReport, TaskSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name of the combined report inside the artifact directory.
pub const REPORT_FILE: &str = "combined_results.json";

/// Errors reading or writing the combined report.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed to read report '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write report '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse report '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// The combined report document as persisted on disk: run metadata plus
/// the collected artifact payloads.
#[derive(Debug, Serialize, Deserialize)]
pub struct CombinedDocument {
    pub metadata: RunReport,
    pub products: Vec<Value>,
}

/// Collects per-task artifacts and statistics into one report.
pub struct Aggregator {
    artifact_dir: PathBuf,
}

impl Aggregator {
    /// Create an aggregator over an artifact directory.
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
        }
    }

    /// Path of a task's conventional artifact file.
    pub fn artifact_path(&self, spec: &TaskSpec) -> PathBuf {
        self.artifact_dir.join(spec.artifact_file())
    }

    /// Path of the combined report file.
    pub fn report_path(&self) -> PathBuf {
        self.artifact_dir.join(REPORT_FILE)
    }

    /// Build a report covering every given spec.
    ///
    /// Stats from the run context are joined by task name; specs with no
    /// recorded stats (a standalone `combine` with no preceding run) get a
    /// placeholder entry. Each task's artifact file is probed regardless
    /// of its declared outcome.
    pub async fn collect(&self, specs: &[TaskSpec], ctx: &RunContext) -> RunReport {
        self.collect_stats(specs, ctx.settled_stats().await)
    }

    /// Build a report from explicit stats, probing artifacts per spec.
    pub fn collect_stats(
        &self,
        specs: &[TaskSpec],
        stats: Vec<ExecutionStats>,
    ) -> RunReport {
        let mut by_name: HashMap<String, ExecutionStats> =
            stats.into_iter().map(|s| (s.name.clone(), s)).collect();

        let mut all = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut stats = by_name
                .remove(&spec.name)
                .unwrap_or_else(|| ExecutionStats::begin(&spec.name));

            stats.artifact_bytes = match std::fs::metadata(self.artifact_path(spec)) {
                Ok(meta) => Some(meta.len()),
                Err(_) => None,
            };
            all.push(stats);
        }

        let report = RunReport::from_stats(all);
        info!(
            tasks = report.total_tasks(),
            succeeded = report.succeeded,
            failed = report.failed,
            artifacts = report.artifacts_collected,
            "Collected run report"
        );
        report
    }

    /// Read and parse every present artifact payload.
    ///
    /// Unreadable or malformed artifacts are skipped with a warning.
    pub fn collect_artifacts(&self, specs: &[TaskSpec]) -> Vec<Value> {
        let mut products = Vec::new();
        for spec in specs {
            let path = self.artifact_path(spec);
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(task = %spec.name, path = %path.display(), "Collected artifact");
                    products.push(value);
                }
                Err(err) => {
                    warn!(task = %spec.name, path = %path.display(), error = %err,
                        "Skipping malformed artifact");
                }
            }
        }
        products
    }

    /// Write the combined report document. Best-effort: a write failure is
    /// logged by the caller and never alters the run's outcome counts.
    pub fn write_report(
        &self,
        report: &RunReport,
        products: Vec<Value>,
    ) -> Result<PathBuf, AggregateError> {
        let path = self.report_path();
        let document = CombinedDocument {
            metadata: report.clone(),
            products,
        };
        let raw = serde_json::to_string_pretty(&document).map_err(|source| {
            AggregateError::Parse {
                path: path.display().to_string(),
                source,
            }
        })?;
        std::fs::write(&path, raw).map_err(|source| AggregateError::Write {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "Combined report written");
        Ok(path)
    }

    /// Collect, then best-effort write the combined document.
    pub fn combine(&self, specs: &[TaskSpec], stats: Vec<ExecutionStats>) -> RunReport {
        let report = self.collect_stats(specs, stats);
        let products = self.collect_artifacts(specs);
        if let Err(err) = self.write_report(&report, products) {
            warn!(error = %err, "Failed to write combined report");
        }
        report
    }

    /// Read the last written combined document back.
    pub fn read_report(&self) -> Result<CombinedDocument, AggregateError> {
        let path = self.report_path();
        let raw = std::fs::read_to_string(&path).map_err(|source| AggregateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| AggregateError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Delete task artifacts older than the given age; returns how many
    /// files were removed. The combined report itself is left alone.
    pub fn purge(&self, specs: &[TaskSpec], older_than: Duration) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;

        for spec in specs {
            let path = self.artifact_path(spec);
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            let stale = meta
                .modified()
                .ok()
                .and_then(|mtime| now.duration_since(mtime).ok())
                .is_some_and(|age| age > older_than);
            if !stale {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(task = %spec.name, path = %path.display(), "Purged stale artifact");
                    removed += 1;
                }
                Err(err) => {
                    warn!(task = %spec.name, path = %path.display(), error = %err,
                        "Failed to purge artifact");
                }
            }
        }

        removed
    }
}

/// Helper used by purge call sites to express "older than N days".
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}
