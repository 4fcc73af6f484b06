//! Configuration file support for pharmrev.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/pharmrev/config.toml`.

use crate::scheduler::MIN_EASE;
use crate::{Error, Result, DEFAULT_INITIAL_EASE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

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

/// Scheduler parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ease assigned to newly created cards
    #[serde(default = "default_initial_ease")]
    pub initial_ease: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease: default_initial_ease(),
        }
    }
}

/// Study session defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_due_limit")]
    pub due_limit: usize,

    #[serde(default = "default_history_days")]
    pub history_days: i64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            due_limit: default_due_limit(),
            history_days: default_history_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("pharmrev")
}

fn default_initial_ease() -> f64 {
    DEFAULT_INITIAL_EASE
}

fn default_owner() -> String {
    "demo".into()
}

fn default_due_limit() -> usize {
    20
}

fn default_history_days() -> i64 {
    7
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the scheduler or store cannot work with
    pub fn validate(&self) -> Result<()> {
        let ease = self.scheduler.initial_ease;
        if !ease.is_finite() || ease < MIN_EASE {
            return Err(Error::Config(format!(
                "scheduler.initial_ease must be at least {}, got {}",
                MIN_EASE, ease
            )));
        }
        if self.study.owner.trim().is_empty() {
            return Err(Error::Config("study.owner must not be empty".into()));
        }
        if self.study.due_limit == 0 {
            return Err(Error::Config("study.due_limit must be positive".into()));
        }
        if self.study.history_days <= 0 {
            return Err(Error::Config("study.history_days must be positive".into()));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("pharmrev").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
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
