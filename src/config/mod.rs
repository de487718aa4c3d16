//! Configuration management

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub banner: BannerConfig,
    pub moderation: ModerationConfig,
}

/// Chat log storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding per-group `.chat` transcripts
    pub log_dir: Option<PathBuf>,

    /// Delete all transcripts when the server starts
    pub purge_logs_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            purge_logs_on_start: true,
        }
    }
}

/// Banner rendering settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerConfig {
    /// Bitmap font file for group-name art; without one, banners fall back
    /// to a plain one-liner
    pub font_path: Option<PathBuf>,
}

/// Outgoing-message moderation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Terms masked in chat text
    pub denylist: Vec<String>,

    /// Character used to mask denylisted terms
    pub mask_char: char,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            denylist: Vec::new(),
            mask_char: '*',
        }
    }
}

impl Config {
    /// Load config from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("netchat")
            .join("config.toml")
    }

    /// Directory for chat transcripts
    pub fn log_dir(&self) -> PathBuf {
        self.storage
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
