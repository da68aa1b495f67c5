//! Configuration management for Shutter.
//!
//! Configuration is loaded from a TOML file in the platform config directory,
//! with defaults for every field. Values are range-checked on load.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::types::DerivativeSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Shutter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings
    pub storage: StorageConfig,

    /// Upload limits
    pub limits: LimitsConfig,

    /// Concurrency settings
    pub pipeline: PipelineConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Derivatives generated for every upload, in output order
    pub derivatives: Vec<DerivativeSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
            derivatives: default_derivatives(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.shutter.shutter/config.toml
    /// - Linux: ~/.config/shutter/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\shutter\config\config.toml
    ///
    /// Falls back to ~/.shutter/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "shutter", "shutter")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".shutter").join("config.toml")
            })
    }

    /// Get the resolved storage root (with ~ expansion).
    pub fn storage_root(&self) -> PathBuf {
        let path_str = self.storage.root.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
