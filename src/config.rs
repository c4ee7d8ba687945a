use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::FilterMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/connfilter/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("connfilter/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the persisted filter list path
    pub fn list_path(&self) -> PathBuf {
        PathBuf::from(&self.filter.list_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Whether entries are a blocklist (deny) or the exclusive
    /// allowlist (allow)
    #[serde(default)]
    pub mode: FilterMode,

    /// Maximum number of filter entries; adds beyond this fail
    #[serde(default = "default_max_filters")]
    pub max_filters: usize,

    /// Path of the persisted filter list
    #[serde(default = "default_list_path")]
    pub list_path: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::default(),
            max_filters: default_max_filters(),
            list_path: default_list_path(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_filters() -> usize {
    1024
}

fn default_list_path() -> String {
    "listip.cfg".to_string()
}
