//! Flat configuration file
//!
//! Persists the two user-facing settings - target and probe mode - as
//! pretty-printed JSON under the platform config directory. A missing
//! or unreadable file yields the defaults; the monitor must come up
//! regardless of config state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::manager::DEFAULT_TARGET;
use crate::probe::ProbeMode;

const CONFIG_DIR: &str = "pingmon";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_target")]
    pub target: String,

    #[serde(default)]
    pub probe_mode: ProbeMode,
}

fn default_target() -> String {
    String::from(DEFAULT_TARGET)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: default_target(),
            probe_mode: ProbeMode::default(),
        }
    }
}

impl Config {
    /// Load from the default location. Any failure - no config dir, no
    /// file, invalid JSON - falls back to defaults.
    pub fn load() -> Self {
        match config_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                warn!("no usable config location: {e}");
                Self::default()
            }
        }
    }

    /// Load from an explicit path, defaulting on any failure and
    /// normalizing invalid fields.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        let mut config: Config = match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("invalid config file {}: {e}", path.display());
                return Self::default();
            }
        };

        if config.target.trim().is_empty() {
            config.target = default_target();
        }

        trace!("loaded config: {config:?}");
        config
    }

    /// Persist to the default location.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))
    }
}

/// Path of the config file, creating the directory when needed.
fn config_path() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("no config directory on this platform")?
        .join(CONFIG_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config dir {}", dir.display()))?;
    Ok(dir.join(CONFIG_FILE))
}
