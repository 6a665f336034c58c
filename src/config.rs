//! Configuration model for the hasp CLI.
//!
//! Represents an optional YAML config file. Unknown fields are ignored for
//! forward compatibility, and every field has a sensible default, so an empty
//! or absent file behaves identically to the built-in defaults.

use crate::error::{HaspError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming a config file, consulted when `--config` is
/// not given.
pub const CONFIG_ENV_VAR: &str = "HASP_CONFIG";

fn default_lock_stale_minutes() -> u32 {
    120
}

fn default_poll_interval_ms() -> u64 {
    25
}

/// Configuration for hasp commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes after which a sidecar's metadata marks it stale for
    /// `hasp list` / `hasp clean`.
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u32,

    /// Poll interval in milliseconds for bounded lock acquisition.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_stale_minutes: default_lock_stale_minutes(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            HaspError::UserError(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            HaspError::UserError(format!(
                "failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Resolve configuration: an explicit path wins, then `HASP_CONFIG`,
    /// then defaults. A named-but-unreadable file is an error rather than a
    /// silent fallback.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(path);
        }
        Ok(Self::default())
    }

    /// The poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
