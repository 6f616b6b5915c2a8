//! Static backend identity and per-store tuning.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_COLLECTION;

/// Environment variable naming the backend config JSON file.
pub const CONFIG_PATH_ENV: &str = "MEDALBOARD_CONFIG";

/// Failure loading or validating [`BackendConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),
    /// Config JSON is malformed.
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    /// A required field is empty.
    #[error("config field `{0}` is required")]
    MissingField(&'static str),
    /// A required environment variable is unset.
    #[error("environment variable `{0}` is not set")]
    MissingEnv(&'static str),
}

/// Project identity handed to the backend once at process start.
///
/// Keys use the same camelCase names as the hosted service's web config.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Public API key.
    pub api_key: String,
    /// Auth domain.
    #[serde(default)]
    pub auth_domain: String,
    /// Project id.
    pub project_id: String,
    /// Storage bucket.
    #[serde(default)]
    pub storage_bucket: String,
    /// Messaging sender id.
    #[serde(default)]
    pub messaging_sender_id: String,
    /// App id.
    #[serde(default)]
    pub app_id: String,
}

impl BackendConfig {
    /// Parses and validates a JSON config object.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reads the file named by `MEDALBOARD_CONFIG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV).ok_or(ConfigError::MissingEnv(CONFIG_PATH_ENV))?;
        Self::from_path(path)
    }

    /// Rejects configs missing the fields every call needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField("apiKey"));
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingField("projectId"));
        }
        Ok(())
    }
}

/// Ranked collection store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Collection to mirror.
    pub collection: String,
    /// Buffer size of the store event broadcast.
    pub events_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            events_capacity: 256,
        }
    }
}

/// Session store settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Buffer size of the session event broadcast.
    pub events_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { events_capacity: 64 }
    }
}
