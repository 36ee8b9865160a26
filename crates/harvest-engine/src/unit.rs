//! Work unit abstraction and the entry-point catalog.
//!
//! A work unit is one opaque, self-contained job: it performs all of its
//! own I/O, writes its own artifact, and reports a binary outcome. Units
//! are reached through an explicit function table keyed by entry-point
//! name, which is what the loader probes.

use async_trait::async_trait;
use harvest_core::LoadError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Opaque failure reported by a work unit.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One invocable unit of work.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// Run the unit to completion. Returning `Ok` is the only success
    /// signal; any artifact the unit produces is written by the unit
    /// itself.
    async fn invoke(&self) -> Result<(), BoxError>;
}

/// Factory producing a unit for a given task name.
///
/// The factory encapsulates whatever resolution the backing resource
/// needs; it may fail with [`LoadError`] if the resource is missing or
/// fails to initialize.
pub type UnitFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn WorkUnit>, LoadError> + Send + Sync>;

/// Explicit function table mapping entry-point names to unit factories.
#[derive(Default, Clone)]
pub struct UnitCatalog {
    entries: HashMap<String, UnitFactory>,
}

impl UnitCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an entry-point name.
    ///
    /// Re-registering a name replaces the previous factory.
    pub fn register(&mut self, entry_point: impl Into<String>, factory: UnitFactory) {
        self.entries.insert(entry_point.into(), factory);
    }

    /// Register a ready-made unit under an entry-point name.
    pub fn register_unit(&mut self, entry_point: impl Into<String>, unit: Arc<dyn WorkUnit>) {
        self.register(entry_point, Arc::new(move |_: &str| Ok(unit.clone())));
    }

    /// Look up a factory by entry-point name.
    pub fn get(&self, entry_point: &str) -> Option<&UnitFactory> {
        self.entries.get(entry_point)
    }

    /// Returns true if an entry-point name is registered.
    pub fn contains(&self, entry_point: &str) -> bool {
        self.entries.contains_key(entry_point)
    }

    /// Number of registered entry points.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry points are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type UnitFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// A work unit backed by a closure. The main production unit is
/// [`crate::script::ScriptUnit`]; this adapter exists for embedding and
/// for tests.
pub struct FnUnit {
    f: Box<dyn Fn() -> UnitFuture + Send + Sync>,
}

impl FnUnit {
    /// Wrap an async closure as a work unit.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            f: Box::new(move || Box::pin(f())),
        }
    }

    /// Convenience: wrap an async closure directly as an `Arc<dyn WorkUnit>`.
    pub fn shared<F, Fut>(f: F) -> Arc<dyn WorkUnit>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl WorkUnit for FnUnit {
    async fn invoke(&self) -> Result<(), BoxError> {
        (self.f)().await
    }
}
