//! Harvest Orchestration Engine
//!
//! Runs a fleet of independent work units with bounded concurrency,
//! per-attempt timeouts, and retry-with-backoff, then aggregates their
//! artifacts into one combined report.
//!
//! The pieces, leaves first:
//! - [`unit`]: the `WorkUnit` seam and the entry-point function table.
//! - [`script`]: production units backed by external extractor scripts.
//! - [`registry`]: the built-in task table plus config-file overrides.
//! - [`loader`]: resolves a spec to an invocable unit, probing fallback
//!   entry-point names.
//! - [`executor`]: the per-task retry/timeout state machine.
//! - [`scheduler`]: priority-ordered execution under a concurrency bound.
//! - [`aggregator`]: artifact collection and the combined report.

pub mod aggregator;
pub mod config;
pub mod context;
pub mod executor;
pub mod loader;
pub mod registry;
pub mod scheduler;
pub mod script;
pub mod unit;

pub use aggregator::{days, AggregateError, Aggregator, CombinedDocument, REPORT_FILE};
pub use config::{ConfigError, RegistryOverrides};
pub use context::RunContext;
pub use executor::Executor;
pub use loader::{LoadedUnit, Loader};
pub use registry::{Registry, RegistryError};
pub use scheduler::{Scheduler, DEFAULT_MAX_CONCURRENT};
pub use script::{resolve_script, script_catalog, ScriptUnit};
pub use unit::{BoxError, FnUnit, UnitCatalog, WorkUnit};
