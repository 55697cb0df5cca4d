//! Configuration management for gemfold.
//!
//! Handles persistence and loading of runtime tunables: the title
//! debounce window and the identity retry budget.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Observer tuning
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Identity resolution tuning
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl Config {
    /// Load configuration from disk, or return default if not found
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;

        Ok(config_dir.join("gemfold").join("config.json"))
    }
}

/// Observer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Debounce window for title persistence, in milliseconds
    /// (250-10000)
    #[serde(default = "default_title_debounce_ms")]
    pub title_debounce_ms: u64,
}

fn default_title_debounce_ms() -> u64 {
    2000
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            title_debounce_ms: default_title_debounce_ms(),
        }
    }
}

impl ObserverConfig {
    /// Validate and clamp the debounce window to a sane range
    pub fn validate(&mut self) {
        self.title_debounce_ms = self.title_debounce_ms.clamp(250, 10_000);
    }

    pub fn title_debounce(&self) -> Duration {
        Duration::from_millis(self.title_debounce_ms)
    }
}

/// Identity resolution tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Probe attempts before falling back to the default identity
    /// (1-50)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between probe attempts, in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_interval_ms() -> u64 {
    500
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl IdentityConfig {
    /// Validate and clamp the retry budget
    pub fn validate(&mut self) {
        self.max_attempts = self.max_attempts.clamp(1, 50);
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
