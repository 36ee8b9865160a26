//! The built-in task registry.
//!
//! One entry per known extractor, with default policy values, optionally
//! overridden from a config file at construction. Content is fixed for
//! the lifetime of a run.

use crate::config::RegistryOverrides;
use harvest_core::TaskSpec;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Registry lookup errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

/// Static mapping from task name to its execution metadata.
pub struct Registry {
    // Insertion order is the priority tie-breaker, so specs live in a Vec
    // with a name index on the side.
    specs: Vec<TaskSpec>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Build the registry of built-in tasks with no overrides.
    pub fn builtin() -> Self {
        Self::with_overrides(&RegistryOverrides::none())
    }

    /// Build the registry of built-in tasks, applying config overrides.
    ///
    /// Override entries naming unknown tasks are warned about and ignored.
    pub fn with_overrides(overrides: &RegistryOverrides) -> Self {
        Self::from_specs(builtin_specs(), overrides)
    }

    /// Build a registry from an explicit spec list plus overrides.
    ///
    /// Later specs with a duplicate name replace earlier ones, keeping the
    /// name-uniqueness invariant.
    pub fn from_specs(
        specs: impl IntoIterator<Item = TaskSpec>,
        overrides: &RegistryOverrides,
    ) -> Self {
        let mut registry = Self {
            specs: Vec::new(),
            by_name: HashMap::new(),
        };

        for mut spec in specs {
            overrides.apply(&mut spec);
            match registry.by_name.get(&spec.name) {
                Some(&idx) => {
                    warn!(task = %spec.name, "Duplicate task name, replacing earlier entry");
                    registry.specs[idx] = spec;
                }
                None => {
                    registry.by_name.insert(spec.name.clone(), registry.specs.len());
                    registry.specs.push(spec);
                }
            }
        }

        for name in overrides.task_names() {
            if !registry.by_name.contains_key(name) {
                warn!(task = %name, "Override for unknown task ignored");
            }
        }

        registry
    }

    /// Look up a spec by name.
    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.by_name.get(name).map(|&idx| &self.specs[idx])
    }

    /// Look up a spec by name, erroring when absent.
    pub fn require(&self, name: &str) -> Result<&TaskSpec, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::TaskNotFound(name.to_string()))
    }

    /// All specs in insertion order.
    pub fn list_all(&self) -> &[TaskSpec] {
        &self.specs
    }

    /// Enabled specs, sorted by priority then insertion order.
    pub fn list_enabled(&self) -> Vec<TaskSpec> {
        let mut enabled: Vec<TaskSpec> =
            self.specs.iter().filter(|s| s.enabled).cloned().collect();
        // Stable sort keeps insertion order within a priority level.
        enabled.sort_by_key(|s| s.priority);
        enabled
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// The known extractor fleet.
///
/// Entry-point names are not uniform across the fleet; the loader's
/// fallback probing covers the stragglers.
fn builtin_specs() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new("7-zip", "7-zip/main.py", "scrape_7zip"),
        TaskSpec::new("anydesk", "anydesk/main.py", "scrape_and_store_html"),
        TaskSpec::new("docker", "docker/main.py", "scrape_docker"),
        TaskSpec::new("fontbase", "fontbase/main.py", "scrape_fontbase"),
        TaskSpec::new("fortinet", "fortinet/main.py", "scrape_fortinet"),
        TaskSpec::new("Foxit_PDF", "Foxit_PDF/main.py", "scrape_foxit_pdf"),
        TaskSpec::new("git", "git/main.py", "scrape_git"),
        TaskSpec::new("google", "google/main.py", "scrape_google"),
        TaskSpec::new("LibreOffice", "LibreOffice/main.py", "scrape_libreoffice"),
        TaskSpec::new("nodejs", "nodejs/latest.py", "scrape_nodejs"),
        TaskSpec::new("postman", "postman/main.py", "scrape_postman"),
        TaskSpec::new("slack", "slack/main.py", "scrape_slack"),
        TaskSpec::new("teamviwer", "teamviwer/main.py", "scrape_teamviwer"),
        TaskSpec::new("utraviews", "utraviews/main.py", "scrape_utraviews"),
        TaskSpec::new("vlc_main", "vlc_main/main.py", "scrape_vlc"),
        TaskSpec::new("vscode", "vscode/main.py", "scrape_vscode"),
        TaskSpec::new("winscp", "winscp/main.py", "scrape_winscp"),
        TaskSpec::new("Zoom", "Zoom/main.py", "scrape_zoom"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lookup() {
        let registry = Registry::builtin();
        assert!(registry.len() >= 18);
        assert!(registry.get("git").is_some());
        assert!(registry.get("no-such-task").is_none());
        assert!(matches!(
            registry.require("no-such-task"),
            Err(RegistryError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_list_enabled_sorted_by_priority_then_insertion() {
        let specs = vec![
            TaskSpec::new("a", "a/main.py", "scrape_a").with_priority(10),
            TaskSpec::new("b", "b/main.py", "scrape_b").with_priority(1),
            TaskSpec::new("c", "c/main.py", "scrape_c").with_priority(10),
            TaskSpec::new("d", "d/main.py", "scrape_d").with_enabled(false),
        ];
        let registry = Registry::from_specs(specs, &RegistryOverrides::none());

        let names: Vec<String> = registry
            .list_enabled()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_overrides_applied_at_construction() {
        let overrides =
            RegistryOverrides::from_json(r#"{"git": {"enabled": false, "priority": 0}}"#).unwrap();
        let registry = Registry::with_overrides(&overrides);

        let git = registry.get("git").unwrap();
        assert!(!git.enabled);
        assert_eq!(git.priority, 0);
        assert!(registry.list_enabled().iter().all(|s| s.name != "git"));
    }

    #[test]
    fn test_unknown_override_task_is_ignored() {
        let overrides =
            RegistryOverrides::from_json(r#"{"not-a-task": {"priority": 0}}"#).unwrap();
        let registry = Registry::with_overrides(&overrides);
        assert!(registry.get("not-a-task").is_none());
    }
}
