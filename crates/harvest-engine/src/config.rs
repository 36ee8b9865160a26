//! Registry overrides from an external configuration file.
//!
//! The file is JSON keyed by task name; each entry may override a task's
//! retry policy, timeout, enabled flag, or priority. Unknown task names
//! and unknown keys within an entry are warned about and skipped, never
//! fatal - a stale config must not take the whole run down.

use harvest_core::TaskSpec;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Overridable policy fields for one task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskOverride {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,

    /// Catch-all for unrecognized keys, reported as warnings.
    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

/// Errors reading the override file itself.
///
/// Only an unreadable or syntactically-invalid file is an error; anything
/// wrong *inside* a well-formed file is downgraded to warnings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// A parsed set of per-task overrides.
#[derive(Debug, Clone, Default)]
pub struct RegistryOverrides {
    entries: HashMap<String, TaskOverride>,
}

impl RegistryOverrides {
    /// An empty override set.
    pub fn none() -> Self {
        Self::default()
    }

    /// Load overrides from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse overrides from a JSON document keyed by task name.
    ///
    /// Entries that are not objects are skipped with a warning.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let doc: HashMap<String, Value> = serde_json::from_str(raw)?;
        let mut entries = HashMap::new();

        for (task, value) in doc {
            match serde_json::from_value::<TaskOverride>(value) {
                Ok(entry) => {
                    for key in entry.unknown.keys() {
                        warn!(task = %task, key = %key, "Ignoring unknown override key");
                    }
                    entries.insert(task, entry);
                }
                Err(err) => {
                    warn!(task = %task, error = %err, "Skipping malformed override entry");
                }
            }
        }

        Ok(Self { entries })
    }

    /// Number of tasks with overrides.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no overrides are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Task names present in the override set.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Apply this set's override for one spec, if any.
    pub fn apply(&self, spec: &mut TaskSpec) {
        let Some(entry) = self.entries.get(&spec.name) else {
            return;
        };
        if let Some(max_retries) = entry.max_retries {
            spec.max_retries = max_retries;
        }
        if let Some(ms) = entry.retry_delay_ms {
            spec.retry_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = entry.timeout_secs {
            spec.timeout = Duration::from_secs(secs);
        }
        if let Some(enabled) = entry.enabled {
            spec.enabled = enabled;
        }
        if let Some(priority) = entry.priority {
            spec.priority = priority;
        }
    }

    /// Returns true if the override set names this task.
    pub fn contains(&self, task: &str) -> bool {
        self.entries.contains_key(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides_fields() {
        let overrides = RegistryOverrides::from_json(
            r#"{"git": {"max_retries": 5, "timeout_secs": 30, "enabled": false, "priority": 1}}"#,
        )
        .unwrap();

        let mut spec = TaskSpec::new("git", "git/main.py", "scrape_git");
        overrides.apply(&mut spec);

        assert_eq!(spec.max_retries, 5);
        assert_eq!(spec.timeout, Duration::from_secs(30));
        assert_eq!(spec.priority, 1);
        assert!(!spec.enabled);
        // Untouched field keeps its default.
        assert_eq!(spec.retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_keys_are_tolerated() {
        let overrides = RegistryOverrides::from_json(
            r#"{"vlc": {"max_retries": 1, "colour": "blue"}}"#,
        )
        .unwrap();

        let mut spec = TaskSpec::new("vlc", "vlc/main.py", "scrape_vlc");
        overrides.apply(&mut spec);
        assert_eq!(spec.max_retries, 1);
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        // "git" is a string, not an object; "slack" is fine.
        let overrides = RegistryOverrides::from_json(
            r#"{"git": "oops", "slack": {"priority": 2}}"#,
        )
        .unwrap();

        assert!(!overrides.contains("git"));
        assert!(overrides.contains("slack"));
    }

    #[test]
    fn test_invalid_document_is_an_error() {
        assert!(RegistryOverrides::from_json("not json").is_err());
    }
}
