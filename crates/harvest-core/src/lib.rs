//! Harvest Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Async runtime
//! - Filesystem/network I/O
//! - The unit-loading mechanism
//!
//! All types here represent the core business domain of Harvest: task
//! specifications, execution statistics, and run reports.

pub mod error;
pub mod ids;
pub mod report;
pub mod spec;
pub mod stats;
pub mod status;

// Re-export commonly used types
pub use error::{ErrorKind, LoadError};
pub use ids::RunId;
pub use report::RunReport;
pub use spec::TaskSpec;
pub use stats::ExecutionStats;
pub use status::TaskState;
