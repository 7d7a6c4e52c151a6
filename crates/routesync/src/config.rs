//! Configuration management for routesync.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::RecordFilter;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "routesync";

/// Default records file name.
const RECORDS_FILE_NAME: &str = "route_data.json";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ROUTESYNC_`, sections separated
///    by `__`, e.g. `ROUTESYNC_REMOTE__LIST_TIMEOUT_MS`)
/// 2. TOML config file at `~/.config/routesync/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Remote service configuration.
    pub remote: RemoteConfig,
    /// View configuration.
    pub view: ViewConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the records file.
    /// Defaults to `~/.local/share/routesync/route_data.json`
    pub records_path: Option<PathBuf>,
    /// Write pretty-printed JSON.
    pub pretty: bool,
}

/// Remote-call configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Bound on the remote listing during reconciliation, in milliseconds.
    pub list_timeout_ms: u64,
    /// Bound on create, delete and candidate calls, in milliseconds.
    pub request_timeout_ms: u64,
}

/// View-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Filter applied when none is given.
    pub default_filter: RecordFilter,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_path: None, // Will be resolved to default at runtime
            pretty: true,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            list_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("ROUTESYNC_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.remote.list_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "list_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.remote.request_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_ms must be greater than 0".to_string(),
            });
        }

        if let Some(path) = &self.storage.records_path {
            if path.as_os_str().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "records_path cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the records file path, resolving defaults if not set.
    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        self.storage
            .records_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(RECORDS_FILE_NAME))
    }

    /// Get the remote listing timeout as a Duration.
    #[must_use]
    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.list_timeout_ms)
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.request_timeout_ms)
    }
}
