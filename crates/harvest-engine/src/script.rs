//! Work units backed by external extractor scripts.
//!
//! The production fleet is a directory of per-site extractor scripts, each
//! doing its own fetching and writing its own `<name>_info.json` artifact.
//! A [`ScriptUnit`] runs one of them as a subprocess; exit status 0 is the
//! success signal.

use crate::unit::{BoxError, UnitCatalog, WorkUnit};
use async_trait::async_trait;
use harvest_core::{LoadError, TaskSpec};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Conventional script file names probed when a spec's configured path is
/// a directory. The fleet is not uniform: most extractors ship `main.py`,
/// but some use `latest.py`.
const SCRIPT_CANDIDATES: &[&str] = &["main.py", "latest.py", "scraper.py"];

/// Maximum stderr bytes carried into an error message.
const STDERR_TAIL_BYTES: usize = 600;

/// A work unit that runs an extractor script as a subprocess.
pub struct ScriptUnit {
    task: String,
    interpreter: String,
    script: PathBuf,
}

impl ScriptUnit {
    /// Create a unit for an already-resolved script path.
    pub fn new(
        task: impl Into<String>,
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
    ) -> Self {
        Self {
            task: task.into(),
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }

    /// The resolved script path.
    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[async_trait]
impl WorkUnit for ScriptUnit {
    async fn invoke(&self) -> Result<(), BoxError> {
        debug!(task = %self.task, script = %self.script.display(), "Spawning extractor script");

        // kill_on_drop: a cancelled or timed-out attempt drops this future
        // and must not leave the subprocess running.
        let output = Command::new(&self.interpreter)
            .arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr
                .char_indices()
                .rev()
                .nth(STDERR_TAIL_BYTES)
                .map(|(i, _)| &stderr[i..])
                .unwrap_or(&stderr)
                .trim();
            Err(format!("exit status {}: {}", output.status, tail).into())
        }
    }
}

/// Resolve a spec's script on disk.
///
/// If the configured path is a file it is used as-is; if it is a
/// directory, conventional script names are probed inside it. A missing
/// path is `UnitNotFound`; a directory with no recognized script is
/// `UnitInvalid`.
pub fn resolve_script(root: &Path, spec: &TaskSpec) -> Result<PathBuf, LoadError> {
    let configured = root.join(&spec.script);
    if configured.is_file() {
        return Ok(configured);
    }

    let dir = if configured.is_dir() {
        configured
    } else {
        match configured.parent() {
            Some(parent) if parent.is_dir() => parent.to_path_buf(),
            _ => {
                return Err(LoadError::not_found(
                    &spec.name,
                    format!("script path does not exist: {}", configured.display()),
                ))
            }
        }
    };

    for candidate in SCRIPT_CANDIDATES {
        let path = dir.join(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }

    Err(LoadError::invalid(
        &spec.name,
        format!(
            "no recognized script ({}) under {}",
            SCRIPT_CANDIDATES.join(", "),
            dir.display()
        ),
    ))
}

/// Build a catalog of script-backed units for a set of specs.
///
/// Script resolution happens inside the factory, at load time, so a
/// missing script surfaces as a `LoadError` rather than an execution
/// failure.
pub fn script_catalog<'a>(
    specs: impl IntoIterator<Item = &'a TaskSpec>,
    root: impl Into<PathBuf>,
    interpreter: impl Into<String>,
) -> UnitCatalog {
    let root = root.into();
    let interpreter = interpreter.into();
    let mut catalog = UnitCatalog::new();

    for spec in specs {
        let spec = spec.clone();
        let root = root.clone();
        let interpreter = interpreter.clone();
        catalog.register(
            spec.entry_point.clone(),
            Arc::new(move |_task: &str| {
                let script = resolve_script(&root, &spec)?;
                Ok(Arc::new(ScriptUnit::new(&spec.name, &interpreter, script))
                    as Arc<dyn WorkUnit>)
            }),
        );
    }

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Loader;

    fn spec(name: &str, script: &str) -> TaskSpec {
        TaskSpec::new(name, script, format!("scrape_{name}"))
    }

    #[test]
    fn test_resolve_exact_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("git")).unwrap();
        std::fs::write(dir.path().join("git/main.py"), "pass").unwrap();

        let path = resolve_script(dir.path(), &spec("git", "git/main.py")).unwrap();
        assert!(path.ends_with("git/main.py"));
    }

    #[test]
    fn test_resolve_probes_directory_candidates() {
        // nodejs ships latest.py, not main.py.
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nodejs")).unwrap();
        std::fs::write(dir.path().join("nodejs/latest.py"), "pass").unwrap();

        let path = resolve_script(dir.path(), &spec("nodejs", "nodejs")).unwrap();
        assert!(path.ends_with("nodejs/latest.py"));
    }

    #[test]
    fn test_resolve_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_script(dir.path(), &spec("gimp", "gimp/main.py")).unwrap_err();
        assert!(matches!(err, LoadError::UnitNotFound { .. }));
    }

    #[test]
    fn test_resolve_dir_without_script_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("vlc")).unwrap();
        std::fs::write(dir.path().join("vlc/readme.txt"), "nothing here").unwrap();

        let err = resolve_script(dir.path(), &spec("vlc", "vlc")).unwrap_err();
        assert!(matches!(err, LoadError::UnitInvalid { .. }));
    }

    #[tokio::test]
    async fn test_script_unit_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok.sh");
        let bad = dir.path().join("bad.sh");
        std::fs::write(&ok, "exit 0\n").unwrap();
        std::fs::write(&bad, "echo broken >&2\nexit 3\n").unwrap();

        let unit = ScriptUnit::new("ok", "sh", &ok);
        assert!(unit.invoke().await.is_ok());

        let unit = ScriptUnit::new("bad", "sh", &bad);
        let err = unit.invoke().await.unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_catalog_factory_defers_resolution_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let specs = vec![spec("docker", "docker/main.py")];
        let catalog = script_catalog(&specs, dir.path(), "python3");
        let loader = Loader::new(Arc::new(catalog));

        // Entry point is registered, but the script is absent on disk.
        let err = loader.load(&specs[0]).unwrap_err();
        assert!(matches!(err, LoadError::UnitNotFound { .. }));
    }
}
