//! Configuration for the Inlet daemon

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{InletError, Result};

/// Main configuration for Inlet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InletConfig {
    /// Remote folder to watch, as a path inside the store
    #[serde(default = "default_folder_path")]
    pub folder_path: String,

    /// Seconds to sleep between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Directory downloaded files land in
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,

    /// Path of the persisted state document
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_folder_path() -> String {
    "/".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_inbox_dir() -> PathBuf {
    inlet_logging::inlet_home().join("inbox")
}

fn default_state_file() -> PathBuf {
    inlet_logging::inlet_home().join("state.json")
}

impl Default for InletConfig {
    fn default() -> Self {
        Self {
            folder_path: default_folder_path(),
            poll_interval_secs: default_poll_interval(),
            inbox_dir: default_inbox_dir(),
            state_file: default_state_file(),
        }
    }
}

impl InletConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: InletConfig =
            toml::from_str(&content).map_err(|e| InletError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| InletError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the values and create the directories the daemon writes to.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(InletError::Config(
                "poll_interval_secs must be positive".to_string(),
            ));
        }

        std::fs::create_dir_all(&self.inbox_dir).map_err(|e| {
            InletError::Config(format!(
                "cannot create inbox directory {}: {e}",
                self.inbox_dir.display()
            ))
        })?;

        if let Some(parent) = self.state_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                InletError::Config(format!(
                    "cannot create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
