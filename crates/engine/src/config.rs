// Engine configuration file.
//
// Global config: `~/.containersync/config.toml`
// Reference store state: `~/.containersync/local.json`, `~/.containersync/remote.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root directory for containersync state: `~/.containersync/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".containersync"))
}

/// Path to the config file: `~/.containersync/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Log full remote and local contents at `debug` after every backup.
    pub debug_dump: bool,
    /// JSON file backing the local identity and assignment stores.
    pub local_state_path: Option<PathBuf>,
    /// JSON file backing the remote sync store.
    pub remote_state_path: Option<PathBuf>,
    /// `tracing` filter directive used when `RUST_LOG` is unset (e.g. `containersync=debug`).
    pub log_filter: Option<String>,
}

impl EngineConfig {
    /// Load from `~/.containersync/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Configured local state file, else `~/.containersync/local.json`.
    pub fn local_state_path(&self) -> Option<PathBuf> {
        self.local_state_path.clone().or_else(|| global_dir().map(|d| d.join("local.json")))
    }

    /// Configured remote state file, else `~/.containersync/remote.json`.
    pub fn remote_state_path(&self) -> Option<PathBuf> {
        self.remote_state_path.clone().or_else(|| global_dir().map(|d| d.join("remote.json")))
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
