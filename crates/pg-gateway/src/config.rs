// config.rs — Gateway configuration.
//
// GuardConfig says where PolicyGuard keeps its four collections and how many
// audit entries and incidents to retain. `for_project()` gives defaults
// under a `.policyguard/` directory in the project root; a
// `policyguard.toml` next to it may override any field.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pg_audit::RetentionLimits;

use crate::error::GatewayError;

/// Name of the optional config file in the project root.
pub const CONFIG_FILE: &str = "policyguard.toml";

/// Actor id recorded on administrative audit entries.
pub const DEFAULT_SYSTEM_ACTOR: &str = "guardian-system";

/// Configuration for the PolicyGuard gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Directory holding `agents.json`, `policies.json`, `audit_log.json`
    /// and `incidents.json`.
    pub data_dir: PathBuf,

    /// Audit entries retained before the oldest are dropped.
    #[serde(default = "default_max_audit_entries")]
    pub max_audit_entries: usize,

    /// Incidents retained before the oldest are dropped.
    #[serde(default = "default_max_incidents")]
    pub max_incidents: usize,

    /// Agent id used on audit entries for registrations, policy changes
    /// and incident reports.
    #[serde(default = "default_system_actor")]
    pub system_actor: String,
}

fn default_max_audit_entries() -> usize {
    RetentionLimits::default().max_audit_entries
}

fn default_max_incidents() -> usize {
    RetentionLimits::default().max_incidents
}

fn default_system_actor() -> String {
    DEFAULT_SYSTEM_ACTOR.to_string()
}

impl GuardConfig {
    /// Defaults with the standard `.policyguard/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        Self::with_data_dir(project_root.as_ref().join(".policyguard"))
    }

    /// Defaults with an explicit data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_audit_entries: default_max_audit_entries(),
            max_incidents: default_max_incidents(),
            system_actor: default_system_actor(),
        }
    }

    /// Load `policyguard.toml` from the project root, or fall back to
    /// `for_project()` if there is none.
    ///
    /// A relative `data_dir` in the file is resolved against the project
    /// root. A missing `data_dir` keeps the default.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let root = project_root.as_ref();
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::for_project(root));
        }

        let text = std::fs::read_to_string(&path).map_err(|source| GatewayError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile =
            toml::from_str(&text).map_err(|source| GatewayError::ConfigParse {
                path: path.clone(),
                source,
            })?;

        let mut config = Self::for_project(root);
        if let Some(dir) = file.data_dir {
            config.data_dir = if dir.is_relative() { root.join(dir) } else { dir };
        }
        if let Some(n) = file.max_audit_entries {
            config.max_audit_entries = n;
        }
        if let Some(n) = file.max_incidents {
            config.max_incidents = n;
        }
        if let Some(actor) = file.system_actor.filter(|a| !a.is_empty()) {
            config.system_actor = actor;
        }
        tracing::debug!(path = %path.display(), data_dir = %config.data_dir.display(), "loaded config");
        Ok(config)
    }

    pub fn retention(&self) -> RetentionLimits {
        RetentionLimits {
            max_audit_entries: self.max_audit_entries,
            max_incidents: self.max_incidents,
        }
    }
}

/// On-disk shape of `policyguard.toml`: every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    max_audit_entries: Option<usize>,
    max_incidents: Option<usize>,
    system_actor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn for_project_layout() {
        let config = GuardConfig::for_project("/srv/app");
        assert_eq!(config.data_dir, PathBuf::from("/srv/app/.policyguard"));
        assert_eq!(config.max_audit_entries, 1000);
        assert_eq!(config.max_incidents, 1000);
        assert_eq!(config.system_actor, "guardian-system");
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = GuardConfig::load(dir.path()).unwrap();
        assert_eq!(config, GuardConfig::for_project(dir.path()));
    }

    #[test]
    fn load_overrides_and_resolves_relative_data_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "data_dir = \"state\"\nmax_audit_entries = 50\n",
        )
        .unwrap();

        let config = GuardConfig::load(dir.path()).unwrap();
        assert_eq!(config.data_dir, dir.path().join("state"));
        assert_eq!(config.max_audit_entries, 50);
        assert_eq!(config.max_incidents, 1000);
        assert_eq!(config.retention().max_audit_entries, 50);
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_entries = 5\n").unwrap();
        assert!(matches!(
            GuardConfig::load(dir.path()),
            Err(GatewayError::ConfigParse { .. })
        ));
    }
}
