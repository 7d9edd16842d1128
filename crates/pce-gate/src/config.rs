// config.rs — Engine configuration.
//
// EngineConfig says where the engine finds its state: the domain registry,
// the ticket store, and the audit log. `for_project()` lays these out under
// a `.pce/` directory in the project root; `.pce/config.toml`, if present,
// can point any of them elsewhere and set the default gate phase.

use std::path::{Path, PathBuf};

use pce_policy::EvidencePhase;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the per-project state directory.
pub const PCE_DIR: &str = ".pce";

/// Where the engine reads and writes its state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root directory of the repository being governed.
    pub project_root: PathBuf,

    /// YAML domain registry.
    pub registry_path: PathBuf,

    /// Directory holding one JSON file per policy ticket.
    pub tickets_dir: PathBuf,

    /// Append-only audit log.
    pub audit_log: PathBuf,

    /// Phase evaluated when a request does not name one.
    pub default_phase: EvidencePhase,
}

/// On-disk overrides from `.pce/config.toml`. Relative paths resolve
/// against the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub registry: Option<PathBuf>,
    #[serde(default)]
    pub tickets_dir: Option<PathBuf>,
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
    #[serde(default)]
    pub default_phase: Option<EvidencePhase>,
}

impl EngineConfig {
    /// Standard `.pce/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let pce_dir = root.join(PCE_DIR);
        Self {
            registry_path: pce_dir.join("registry.yaml"),
            tickets_dir: pce_dir.join("tickets"),
            audit_log: pce_dir.join("audit.jsonl"),
            default_phase: EvidencePhase::PreMerge,
            project_root: root,
        }
    }

    /// Path of the optional override file.
    pub fn overrides_path(project_root: impl AsRef<Path>) -> PathBuf {
        project_root.as_ref().join(PCE_DIR).join("config.toml")
    }

    /// `.pce/` layout with `.pce/config.toml` applied when it exists.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = project_root.as_ref();
        let mut config = Self::for_project(root);

        let path = Self::overrides_path(root);
        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let overrides: ConfigOverrides =
            toml::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: path.clone(),
                source,
            })?;

        config.apply(overrides);
        tracing::debug!(path = %path.display(), "applied engine config overrides");
        Ok(config)
    }

    fn apply(&mut self, overrides: ConfigOverrides) {
        let root = self.project_root.clone();
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

        if let Some(p) = overrides.registry {
            self.registry_path = resolve(p);
        }
        if let Some(p) = overrides.tickets_dir {
            self.tickets_dir = resolve(p);
        }
        if let Some(p) = overrides.audit_log {
            self.audit_log = resolve(p);
        }
        if let Some(phase) = overrides.default_phase {
            self.default_phase = phase;
        }
    }
}
