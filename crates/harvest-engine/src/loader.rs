//! Resolving task specs to invocable units.

use crate::unit::{UnitCatalog, WorkUnit};
use harvest_core::{LoadError, TaskSpec};
use std::sync::Arc;
use tracing::{debug, warn};

/// A task spec bound to a resolved, invocable unit.
///
/// Created fresh per execution; the unit instance is reused across that
/// execution's retry attempts but never shared between tasks.
pub struct LoadedUnit {
    pub spec: TaskSpec,
    pub unit: Arc<dyn WorkUnit>,
}

impl std::fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("spec", &self.spec)
            .field("unit", &"<dyn WorkUnit>")
            .finish()
    }
}

/// Resolves specs against the entry-point catalog.
#[derive(Clone)]
pub struct Loader {
    catalog: Arc<UnitCatalog>,
}

impl Loader {
    /// Create a loader over a catalog.
    pub fn new(catalog: Arc<UnitCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolve a spec to an invocable unit.
    ///
    /// The configured entry point is probed first, then conventional
    /// fallback names in order; the first registered candidate wins. The
    /// fleet of extractors is heterogeneous and not all of them expose
    /// identical naming, hence the fallback list. Exhausting all
    /// candidates is `UnitNotFound`; a matching factory that fails to
    /// build its unit surfaces that factory's error.
    pub fn load(&self, spec: &TaskSpec) -> Result<LoadedUnit, LoadError> {
        for candidate in candidate_entry_points(spec) {
            let Some(factory) = self.catalog.get(&candidate) else {
                continue;
            };
            if candidate != spec.entry_point {
                warn!(
                    task = %spec.name,
                    configured = %spec.entry_point,
                    resolved = %candidate,
                    "Configured entry point missing, resolved via fallback name"
                );
            }
            let unit = factory(&spec.name)?;
            debug!(task = %spec.name, entry_point = %candidate, "Unit resolved");
            return Ok(LoadedUnit {
                spec: spec.clone(),
                unit,
            });
        }

        Err(LoadError::not_found(
            &spec.name,
            format!(
                "no entry point among candidates {:?}",
                candidate_entry_points(spec)
            ),
        ))
    }
}

/// Ordered entry-point candidates for a spec: the configured name first,
/// then conventional fallbacks. First match wins; multiple matching
/// candidates are not treated as ambiguous.
fn candidate_entry_points(spec: &TaskSpec) -> Vec<String> {
    let ident = identifier(&spec.name);
    let mut candidates = vec![
        spec.entry_point.clone(),
        format!("scrape_{ident}"),
        format!("{ident}_scraper"),
        format!("run_{ident}"),
        ident,
    ];
    candidates.dedup();
    candidates
}

/// Normalize a task name into identifier form ("7-zip" -> "7_zip").
fn identifier(name: &str) -> String {
    name.to_lowercase().replace(['-', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::FnUnit;

    fn spec(name: &str, entry_point: &str) -> TaskSpec {
        TaskSpec::new(name, format!("{name}/main.py"), entry_point)
    }

    #[test]
    fn test_load_configured_entry_point() {
        let mut catalog = UnitCatalog::new();
        catalog.register_unit("scrape_git", FnUnit::shared(|| async { Ok(()) }));
        let loader = Loader::new(Arc::new(catalog));

        let loaded = loader.load(&spec("git", "scrape_git")).unwrap();
        assert_eq!(loaded.spec.name, "git");
    }

    #[test]
    fn test_load_falls_back_to_conventional_name() {
        // Configured entry point is absent; the scrape_<name> fallback hits.
        let mut catalog = UnitCatalog::new();
        catalog.register_unit("scrape_anydesk", FnUnit::shared(|| async { Ok(()) }));
        let loader = Loader::new(Arc::new(catalog));

        let loaded = loader
            .load(&spec("anydesk", "scrape_and_store_html"))
            .unwrap();
        assert_eq!(loaded.spec.name, "anydesk");
    }

    #[tokio::test]
    async fn test_load_first_match_wins() {
        // Both the configured name and a fallback exist; the configured
        // one is taken without ambiguity checking.
        let mut catalog = UnitCatalog::new();
        catalog.register_unit("primary", FnUnit::shared(|| async { Ok(()) }));
        catalog.register_unit(
            "scrape_docker",
            FnUnit::shared(|| async { Err("fallback".into()) }),
        );
        let loader = Loader::new(Arc::new(catalog));

        let loaded = loader.load(&spec("docker", "primary")).unwrap();
        assert!(loaded.unit.invoke().await.is_ok());
    }

    #[test]
    fn test_load_not_found_when_exhausted() {
        let loader = Loader::new(Arc::new(UnitCatalog::new()));
        let err = loader.load(&spec("gimp", "scrape_gimp")).unwrap_err();
        assert!(matches!(err, LoadError::UnitNotFound { .. }));
    }

    #[test]
    fn test_load_surfaces_factory_failure() {
        let mut catalog = UnitCatalog::new();
        catalog.register(
            "scrape_slack",
            Arc::new(|task: &str| Err(LoadError::invalid(task, "init failed"))),
        );
        let loader = Loader::new(Arc::new(catalog));

        let err = loader.load(&spec("slack", "scrape_slack")).unwrap_err();
        assert!(matches!(err, LoadError::UnitInvalid { .. }));
    }

    #[test]
    fn test_candidates_normalize_hyphenated_names() {
        let candidates = candidate_entry_points(&spec("7-zip", "scrape_7zip"));
        assert!(candidates.contains(&"scrape_7_zip".to_string()));
    }
}
