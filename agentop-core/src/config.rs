//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/agentop/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/agentop/` (~/.config/agentop/)
//! - Cache: `$XDG_CACHE_HOME/agentop/` (~/.cache/agentop/)
//! - State/Logs: `$XDG_STATE_HOME/agentop/` (~/.local/state/agentop/)

use crate::error::{Error, Result};
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

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Monitoring configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Pricing configuration
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Monitoring configuration
#[derive(Debug, Deserialize)]
pub struct MonitorConfig {
    /// Override path for the agent home directory (containing projects/
    /// and todos/)
    pub log_dir: Option<PathBuf>,

    /// Seconds between timed full re-scans (also the polling interval)
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Prefer filesystem-event watching over polling
    #[serde(default = "default_watch_enabled")]
    pub watch: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            refresh_secs: default_refresh_secs(),
            watch: default_watch_enabled(),
        }
    }
}

fn default_refresh_secs() -> u64 {
    2
}

fn default_watch_enabled() -> bool {
    true
}

/// Pricing configuration
#[derive(Debug, Deserialize)]
pub struct PricingConfig {
    /// Never fetch the remote price sheet (cache and bundled rates only)
    #[serde(default)]
    pub offline: bool,

    /// Override path for the price cache file
    pub cache_path: Option<PathBuf>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            offline: false,
            cache_path: None,
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

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.monitor.refresh_secs == 0 {
            return Err(Error::Config(
                "monitor.refresh_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved agent home directory: the configured override, or `~/.claude`.
    pub fn log_dir(&self) -> PathBuf {
        self.monitor
            .log_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude"))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/agentop/config.toml` (~/.config/agentop/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("agentop").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/agentop/` (~/.local/state/agentop/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("agentop")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.monitor.log_dir.is_none());
        assert_eq!(config.monitor.refresh_secs, 2);
        assert!(config.monitor.watch);
        assert!(!config.pricing.offline);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[monitor]
log_dir = "/srv/agents"
refresh_secs = 5
watch = false

[pricing]
offline = true

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.log_dir(), PathBuf::from("/srv/agents"));
        assert_eq!(config.monitor.refresh_secs, 5);
        assert!(!config.monitor.watch);
        assert!(config.pricing.offline);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_refresh_rejected() {
        let config: Config = toml::from_str("[monitor]\nrefresh_secs = 0\n").unwrap();
        assert!(config.validate().is_err());
    }
}
