//! File system paths for the portal client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Flow-state filename under the base directory.
const FLOW_STATE_NAME: &str = "flow-state.json";

/// Manages file system paths for the portal client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.tidewatch)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.tidewatch`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".tidewatch"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.tidewatch).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.tidewatch/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the flow-state file path (~/.tidewatch/flow-state.json).
    ///
    /// Holds the ephemeral sign-in flow state (anti-forgery token, recorded
    /// mode, provisioning flags). Never synced anywhere.
    pub fn flow_state_file(&self) -> PathBuf {
        self.base_dir.join(FLOW_STATE_NAME)
    }

    /// Get the logs directory (~/.tidewatch/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().expect("Failed to determine home directory")
    }
}
