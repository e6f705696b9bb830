//! Configuration file support for Devo.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/devo/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub challenge: ChallengeConfig,

    #[serde(default)]
    pub study: StudyConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Content source configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ContentConfig {
    /// JSON file of study units; the built-in catalog is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

/// Daily challenge configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default = "default_fallback_title")]
    pub fallback_title: String,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            fallback_title: default_fallback_title(),
        }
    }
}

/// Study list configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Entries shown in the "continue reading" list
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devo")
}

fn default_fallback_title() -> String {
    crate::daily_cache::DEFAULT_FALLBACK_TITLE.to_string()
}

fn default_recent_limit() -> usize {
    5
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.challenge.fallback_title.trim().is_empty() {
            return Err(Error::Config("challenge.fallback_title must not be empty".into()));
        }
        if self.study.recent_limit == 0 {
            return Err(Error::Config("study.recent_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("devo")
            .join("config.toml")
    }

    /// Path of the progress and cache store inside the data directory
    pub fn store_path(&self) -> PathBuf {
        self.data.data_dir.join("store.json")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
