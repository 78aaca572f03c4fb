//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/o2mc/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/o2mc/` (~/.config/o2mc/)
//! - State/Logs: `$XDG_STATE_HOME/o2mc/` (~/.local/state/o2mc/)

use crate::error::{Error, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

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
    /// Tracker (facade + dispatch) configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Tracker configuration
///
/// Set once when the facade is built and treated as immutable afterwards.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Application identifier sent with every batch
    #[serde(default)]
    pub app_id: String,

    /// Collector endpoint batches are POSTed to
    #[serde(default)]
    pub endpoint: String,

    /// Seconds between dispatch cycles
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_secs: f64,

    /// Start the dispatch timer as soon as the facade is built
    #[serde(default)]
    pub force_start_timer: bool,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Consecutive failed dispatches tolerated before the pending batch is discarded
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            endpoint: String::new(),
            dispatch_interval_secs: default_dispatch_interval(),
            force_start_timer: false,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_dispatch_interval() -> f64 {
    30.0
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    5
}

impl TrackerConfig {
    /// Build a config from the four facade arguments, keeping defaults for the rest
    pub fn new(
        app_id: impl Into<String>,
        endpoint: impl Into<String>,
        dispatch_interval: Duration,
        force_start_timer: bool,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            endpoint: endpoint.into(),
            dispatch_interval_secs: dispatch_interval.as_secs_f64(),
            force_start_timer,
            ..Default::default()
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::Config("tracker.app_id must not be empty".to_string()));
        }
        parse_endpoint(&self.endpoint)?;
        self.dispatch_interval()?;
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "tracker.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Dispatch interval as a `Duration`
    ///
    /// Zero, negative and non-finite values are rejected: a periodic task
    /// needs a positive period.
    pub fn dispatch_interval(&self) -> Result<Duration> {
        let secs = self.dispatch_interval_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(Error::Config(format!(
                "tracker.dispatch_interval_secs must be a positive number, got {}",
                secs
            )));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| Error::Config(format!("invalid dispatch interval: {}", e)))
    }

    /// Parsed endpoint URL
    pub fn endpoint_url(&self) -> Result<Url> {
        parse_endpoint(&self.endpoint)
    }

    /// HTTP request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse and check a collector endpoint (absolute http/https URL)
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("tracker.endpoint must not be empty".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| Error::Config(format!("invalid endpoint {:?}: {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "endpoint scheme must be http or https, got {:?}",
            other
        ))),
    }
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/o2mc/config.toml` (~/.config/o2mc/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("o2mc").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/o2mc/` (~/.local/state/o2mc/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("o2mc")
    }

    /// Returns the log file path prefix
    ///
    /// Rotated files get a date suffix appended by the appender.
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("o2mc.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TrackerConfig {
        TrackerConfig::new(
            "app-123",
            "https://collector.example.com",
            Duration::from_secs(30),
            true,
        )
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 5);
        assert_eq!(config.tracker.dispatch_interval_secs, 30.0);
        assert_eq!(config.tracker.timeout_secs, 30);
        assert_eq!(config.tracker.max_retries, 5);
        assert!(!config.tracker.force_start_timer);
    }

    #[test]
    fn test_default_tracker_config_is_not_valid() {
        // No app id or endpoint out of the box
        assert!(TrackerConfig::default().validate().is_err());
    }

    #[test]
    fn test_tracker_config_validation() {
        assert!(valid().validate().is_ok());

        let config = TrackerConfig {
            app_id: String::new(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = TrackerConfig {
            app_id: "   ".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            endpoint: String::new(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = TrackerConfig {
            endpoint: "not a url".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            endpoint: "ftp://collector.example.com".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatch_interval_bounds() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = TrackerConfig {
                dispatch_interval_secs: bad,
                ..valid()
            };
            assert!(config.dispatch_interval().is_err(), "{} accepted", bad);
        }

        let config = TrackerConfig {
            dispatch_interval_secs: 0.25,
            ..valid()
        };
        assert_eq!(
            config.dispatch_interval().unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_new_keeps_interval() {
        let config = TrackerConfig::new("a", "http://localhost", Duration::from_millis(1500), false);
        assert_eq!(config.dispatch_interval().unwrap(), Duration::from_millis(1500));
        assert!(!config.force_start_timer);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[tracker]
app_id = "app-123"
endpoint = "https://collector.example.com"
dispatch_interval_secs = 10
force_start_timer = true
max_retries = 2

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.tracker.app_id, "app-123");
        assert_eq!(config.tracker.endpoint, "https://collector.example.com");
        assert_eq!(config.tracker.dispatch_interval_secs, 10.0);
        assert!(config.tracker.force_start_timer);
        assert_eq!(config.tracker.max_retries, 2);
        assert_eq!(config.tracker.timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
        assert!(config.tracker.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[tracker]\napp_id = \"x\"\nendpoint = \"http://127.0.0.1:9\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.tracker.app_id, "x");

        std::fs::write(&path, "[tracker\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_log_path() {
        assert!(Config::log_path().ends_with("o2mc/o2mc.log"));
    }
}
