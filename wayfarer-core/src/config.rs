//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/wayfarer/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/wayfarer/` (~/.config/wayfarer/)
//! - Data: `$XDG_DATA_HOME/wayfarer/` (~/.local/share/wayfarer/)
//! - State/Logs: `$XDG_STATE_HOME/wayfarer/` (~/.local/state/wayfarer/)

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
    /// Remote service configuration (trips, weather, directions, chat)
    #[serde(default)]
    pub api: ApiConfig,

    /// Sync behavior
    #[serde(default)]
    pub sync: SyncConfig,

    /// Offline store location overrides
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote service configuration
///
/// One backend serves every endpoint wayfarer talks to: the trip
/// collection, the weather and directions proxies, the map config, and
/// the chat service. Without a `server_url` the tool still works fully
/// offline; saved trips just stay `pending`.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Backend base URL (e.g., `https://trips.example.com`)
    pub server_url: Option<String>,

    /// API key sent as a bearer token (not needed for open dev servers)
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_api_max_retries")]
    pub max_retries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            timeout_secs: default_api_timeout(),
            max_retries: default_api_max_retries(),
        }
    }
}

impl ApiConfig {
    /// Check if remote calls can be attempted at all
    pub fn is_ready(&self) -> bool {
        self.server_url.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(Error::Config(
                "api.timeout_secs must be between 1 and 300".to_string(),
            ));
        }
        if let Some(url) = &self.server_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "api.server_url must start with http:// or https://, got {}",
                    url
                )));
            }
        }
        Ok(())
    }
}

fn default_api_timeout() -> u64 {
    30
}

fn default_api_max_retries() -> usize {
    3
}

/// Sync behavior configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Automatic push attempts per trip before it needs a manual retry
    #[serde(default = "default_max_sync_attempts")]
    pub max_sync_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_sync_attempts: default_max_sync_attempts(),
        }
    }
}

fn default_max_sync_attempts() -> u32 {
    3
}

/// Offline store location overrides
#[derive(Debug, Deserialize, Default, Clone)]
pub struct StoreConfig {
    /// Directory for the trip and sync-state blobs (defaults to the XDG
    /// data dir)
    pub dir: Option<PathBuf>,
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

        config.api.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/wayfarer/config.toml` (~/.config/wayfarer/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("wayfarer").join("config.toml")
    }

    /// Returns the data directory path (for the store blobs)
    ///
    /// `$XDG_DATA_HOME/wayfarer/` (~/.local/share/wayfarer/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("wayfarer")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/wayfarer/` (~/.local/state/wayfarer/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("wayfarer")
    }

    /// Directory holding the store blobs, honoring the `store.dir` override
    pub fn store_dir(&self) -> PathBuf {
        self.store.dir.clone().unwrap_or_else(Self::data_dir)
    }

    /// Path of the trip collection blob
    pub fn trips_path(&self) -> PathBuf {
        self.store_dir().join("trips.json")
    }

    /// Path of the last-sync metadata blob
    pub fn sync_state_path(&self) -> PathBuf {
        self.store_dir().join("sync_state.json")
    }

    /// Path of the chat thread mapping blob
    pub fn threads_path(&self) -> PathBuf {
        self.store_dir().join("chat_threads.json")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/wayfarer/wayfarer.log` (~/.local/state/wayfarer/wayfarer.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("wayfarer.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api.server_url.is_none());
        assert!(!config.api.is_ready());
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.sync.max_sync_attempts, 3);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[api]
server_url = "https://trips.example.com"
api_key = "wf_live_xxxxxxxxxxxx"
timeout_secs = 10

[sync]
max_sync_attempts = 5

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.api.server_url.as_deref(),
            Some("https://trips.example.com")
        );
        assert_eq!(config.api.timeout_secs, 10);
        assert!(config.api.is_ready());
        assert_eq!(config.sync.max_sync_attempts, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_api_config_validation() {
        // No server_url is valid: fully offline use
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_ready());

        let config = ApiConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ApiConfig {
            server_url: Some("ftp://nope".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ApiConfig {
            server_url: Some("https://trips.example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.is_ready());
    }

    #[test]
    fn test_store_dir_override() {
        let toml = r#"
[store]
dir = "/tmp/wayfarer-test"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.trips_path(), PathBuf::from("/tmp/wayfarer-test/trips.json"));
        assert_eq!(
            config.sync_state_path(),
            PathBuf::from("/tmp/wayfarer-test/sync_state.json")
        );
    }
}
