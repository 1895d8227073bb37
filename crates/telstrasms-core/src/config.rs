//! Application configuration management.
//!
//! Configuration is stored at `~/.config/telstrasms/config.json` and is
//! optional: every field has a default. `TELSTRASMS_API_URL` and
//! `TELSTRASMS_KEYS_FILE` override the file, so a `.env` can point the
//! client at a sandbox or another key file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_BASE_URL;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "telstrasms";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Key file name, looked up beside the executable by default
const KEYS_FILE: &str = "keys.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "TELSTRASMS_API_URL";

/// Environment variable overriding the key file location
pub const KEYS_FILE_ENV: &str = "TELSTRASMS_KEYS_FILE";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_file: Option<PathBuf>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        Ok(config.with_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(KEYS_FILE_ENV).ok(),
        ))
    }

    /// Apply override values; blank values are ignored
    pub fn with_overrides(mut self, api_url: Option<String>, keys_file: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url.trim().to_string());
        }
        if let Some(keys) = keys_file.filter(|k| !k.trim().is_empty()) {
            self.keys_file = Some(PathBuf::from(keys.trim()));
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Where the key file lives: configured path, else beside the
    /// executable, else the working directory.
    pub fn keys_path(&self) -> PathBuf {
        if let Some(ref path) = self.keys_file {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(KEYS_FILE)))
            .unwrap_or_else(|| PathBuf::from(KEYS_FILE))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }
}
