//! Application configuration management.
//!
//! Configuration is stored at `~/.config/oncall-roster/config.json`. Every
//! field is optional; missing fields take the built-in defaults, and the
//! backend and snapshot URLs can be overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::cache::DEFAULT_ROSTER_KEY;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "oncall-roster";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BACKEND_URL: &str = "https://sheets-proxy-backend.onrender.com";

pub const DEFAULT_SNAPSHOT_URL: &str =
    "https://raw.githubusercontent.com/dr-afif/hsaas-oncallroster/main/contacts-snapshot.json";

const DEFAULT_LOADING_TIMEOUT_SECS: u64 = 60;

pub const ENV_BACKEND_URL: &str = "ONCALL_BACKEND_URL";
pub const ENV_SNAPSHOT_URL: &str = "ONCALL_SNAPSHOT_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub snapshot_url: String,
    pub cache_key: String,
    pub loading_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            snapshot_url: DEFAULT_SNAPSHOT_URL.to_string(),
            cache_key: DEFAULT_ROSTER_KEY.to_string(),
            loading_timeout_secs: DEFAULT_LOADING_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Replace URLs with non-empty values from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(url) = non_empty(ENV_SNAPSHOT_URL) {
            self.snapshot_url = url;
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.backend_url.trim_end_matches('/'), name)
    }

    /// Live roster endpoint; also serves the contacts sheet for the board.
    pub fn contacts_url(&self) -> String {
        self.endpoint("contacts")
    }

    pub fn timetable_url(&self) -> String {
        self.endpoint("timetable")
    }

    pub fn loading_timeout(&self) -> Duration {
        Duration::from_secs(self.loading_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
