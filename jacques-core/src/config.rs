//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/jacques/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/jacques/` (~/.config/jacques/)
//! - Data: `$XDG_DATA_HOME/jacques/` (~/.local/share/jacques/)
//! - State/Logs: `$XDG_STATE_HOME/jacques/` (~/.local/state/jacques/)

use crate::error::{Error, Result};
use crate::filter::FilterPolicy;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Session capture locations
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Archival behavior
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where captured session transcripts live
#[derive(Debug, Deserialize, Default)]
pub struct SessionsConfig {
    /// Override the session root (`<root>/<project-slug>/<session-id>.jsonl`)
    pub root: Option<PathBuf>,
}

impl SessionsConfig {
    /// Resolved session root, defaulting to the data directory
    pub fn root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("sessions"))
    }
}

/// Archival behavior configuration
#[derive(Debug, Deserialize)]
pub struct ArchiveConfig {
    /// Filter policy applied when summarizing sessions
    #[serde(default)]
    pub policy: FilterPolicy,

    /// Recompute manifests that already exist
    #[serde(default)]
    pub force: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            policy: FilterPolicy::default(),
            force: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/jacques/config.toml` (~/.config/jacques/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("jacques").join("config.toml")
    }

    /// Returns the data directory path (for the catalog)
    ///
    /// `$XDG_DATA_HOME/jacques/` (~/.local/share/jacques/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("jacques")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/jacques/` (~/.local/state/jacques/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("jacques")
    }

    /// Returns the catalog database file path
    ///
    /// `$XDG_DATA_HOME/jacques/catalog.db` (~/.local/share/jacques/catalog.db)
    pub fn catalog_path() -> PathBuf {
        Self::data_dir().join("catalog.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/jacques/jacques.log` (~/.local/state/jacques/jacques.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("jacques.log")
    }
}
