use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::blockade::DEFAULT_BASE_URL;
use crate::workflow::WorkflowConfig;

// ---------------------------------------------------------------------------
// Settings — read from {dataDir}/settings.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    #[serde(alias = "baseURL")]
    pub base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_poll_timeout_secs() -> u64 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load from `settings.json` under `dir`, falling back to defaults when
    /// the file is missing or unparseable. BLOCKADE_API_KEY in the
    /// environment overrides the file's key.
    pub fn load(dir: &Path) -> Settings {
        let path = dir.join("settings.json");
        let mut settings: Settings = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Settings::default(),
        };
        if let Ok(key) = std::env::var("BLOCKADE_API_KEY") {
            if !key.is_empty() {
                settings.api_key = key;
            }
        }
        settings
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}

/// Per-user data directory holding settings and downloaded images.
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("could not determine data directory")?;
    Ok(base.join("skyforge"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_production_api() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "https://backend.blockadelabs.com");
        assert!(settings.api_key.is_empty());
        assert_eq!(settings.poll_interval_secs, 3);
        assert_eq!(settings.poll_timeout_secs, 600);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"apiKey":"k"}"#).unwrap();
        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.base_url, "https://backend.blockadelabs.com");
    }

    #[test]
    fn accepts_the_legacy_base_url_alias() {
        let settings: Settings =
            serde_json::from_str(r#"{"baseURL":"http://localhost:8080"}"#).unwrap();
        assert_eq!(settings.base_url, "http://localhost:8080");
    }

    #[test]
    fn workflow_config_carries_the_configured_durations() {
        let settings: Settings =
            serde_json::from_str(r#"{"pollIntervalSecs":1,"pollTimeoutSecs":30}"#).unwrap();
        let config = settings.workflow_config();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.poll_timeout, Duration::from_secs(30));
    }
}
