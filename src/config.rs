//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::ApiConfig;
use crate::store::DEFAULT_LANGUAGE;
use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins, empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Room store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Keep rooms in process memory only
    #[serde(default)]
    pub in_memory: bool,
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("pairsync").join("pairsync.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./pairsync_data/pairsync.db".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            in_memory: false,
        }
    }
}

/// Collaboration hub limits
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_max_connections() -> usize {
    1000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            outbound_queue_capacity: default_queue_capacity(),
            default_language: default_language(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load an explicit file, or fall back to the default locations
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("pairsync").join("config.toml")),
            Some(PathBuf::from("/etc/pairsync/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("PAIRSYNC_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PAIRSYNC_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(path) = lookup("PAIRSYNC_DATABASE") {
            self.storage.database_path = path;
        }
        if let Some(flag) = lookup("PAIRSYNC_IN_MEMORY") {
            self.storage.in_memory =
                matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(max) = lookup("PAIRSYNC_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.hub.max_connections = max;
        }

        if let Some(level) = lookup("PAIRSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PAIRSYNC_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.hub.outbound_queue_capacity == 0 {
            return Err("hub.outbound_queue_capacity must be at least 1".to_string());
        }
        if self.hub.max_connections == 0 {
            return Err("hub.max_connections must be at least 1".to_string());
        }
        Ok(())
    }

    /// Settings for the HTTP layer
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            cors_origins: self.server.cors_origins.clone(),
        }
    }

    /// Settings for the collaboration hub
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections: self.hub.max_connections.max(1),
            outbound_queue_capacity: self.hub.outbound_queue_capacity.max(1),
            default_language: self.hub.default_language.clone(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pairsync={},tower_http={}",
            config.level, config.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Pairsync Configuration
#
# Environment variables override these settings:
# - PAIRSYNC_HOST
# - PAIRSYNC_PORT
# - PAIRSYNC_DATABASE
# - PAIRSYNC_IN_MEMORY
# - PAIRSYNC_MAX_CONNECTIONS
# - PAIRSYNC_LOG_LEVEL
# - PAIRSYNC_LOG_FORMAT

[server]
# Address to bind
host = "0.0.0.0"
port = 8000

# Allowed CORS origins (empty list allows any origin)
cors_origins = []

[storage]
# SQLite database holding rooms and documents
database_path = "~/.local/share/pairsync/pairsync.db"

# Keep rooms in memory only (lost on restart)
in_memory = false

[hub]
# Concurrent WebSocket sessions across all rooms
max_connections = 1000

# Messages buffered per session before it is dropped as stalled
outbound_queue_capacity = 256

# Language used for documents and updates that carry none
default_language = "python"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty, json
format = "pretty"
"#
    .to_string()
}
