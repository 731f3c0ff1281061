//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! customer API base URL, the refresh threshold and request timeout, and
//! which durable storage backend holds the persisted tokens.
//!
//! Configuration is stored at `~/.config/teller/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::lifecycle::{DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_REFRESH_TIMEOUT_SECS};
use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, TokenStorage};

/// Application name used for config/cache directory paths and the keychain service
const APP_NAME: &str = "teller";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Token file name in cache directory, used by the file storage backend
const SESSION_FILE: &str = "session.json";

/// Environment variable overriding `api_base_url`
const API_URL_ENV: &str = "TELLER_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub refresh_threshold_secs: i64,
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            request_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            storage: StorageBackend::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides (after `.env` has been loaded)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        self
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

    pub fn refresh_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_threshold_secs.max(0))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Open the configured durable storage backend
    pub fn open_storage(&self) -> Result<Arc<dyn TokenStorage>> {
        let storage: Arc<dyn TokenStorage> = match self.storage {
            StorageBackend::Keyring => Arc::new(KeyringStorage::new(APP_NAME)),
            StorageBackend::File => Arc::new(FileStorage::new(self.cache_dir()?.join(SESSION_FILE))),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(storage)
    }
}
