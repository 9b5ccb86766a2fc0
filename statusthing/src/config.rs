//! Configuration management using Figment
//!
//! Sources, highest priority first:
//! 1. Environment variables prefixed `STATUSTHING_`, with `__` separating
//!    nested keys (`STATUSTHING_API__API_KEY`, `STATUSTHING_SERVICE__PORT`)
//! 2. `./statusthing.toml`
//! 3. `~/.config/statusthing/config.toml` (XDG)
//! 4. `/etc/statusthing/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storer::StorerOptions;

const ENV_PREFIX: &str = "STATUSTHING_";
const APP_NAME: &str = "statusthing";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// API surface configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, reported by the health routes
    #[serde(default = "default_name")]
    pub name: String,

    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Force debug logging regardless of `log_level`
    #[serde(default)]
    pub debug: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            debug: false,
            timeout_secs: default_timeout(),
        }
    }
}

/// API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Path the API routes are mounted under
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Shared secret required in the `X-STATUSTHING-KEY` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            api_key: None,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum number of connection retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in seconds (uses exponential backoff)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Create the `statusthings` table on startup
    #[serde(default = "default_true")]
    pub create_table: bool,

    /// Deadline for each storage operation in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout_secs: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connection_timeout_secs: default_connection_timeout(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            create_table: true,
            query_timeout_secs: None,
        }
    }
}

impl DatabaseConfig {
    /// Build a `sqlite://` URL for a database file
    pub fn url_for_file(path: impl AsRef<Path>) -> String {
        format!("sqlite://{}", path.as_ref().display())
    }

    /// Storer options derived from this configuration
    pub fn storer_options(&self) -> StorerOptions {
        StorerOptions {
            create_table: self.create_table,
            query_timeout: self.query_timeout_secs.map(Duration::from_secs),
        }
    }
}

// Default value functions
fn default_name() -> String {
    APP_NAME.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_base_path() -> String {
    "/statusthing/api".to_string()
}

fn default_database_url() -> String {
    DatabaseConfig::url_for_file("statusthing.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard locations
    ///
    /// The result is not validated; call [`Config::validate`] once any
    /// overrides have been applied.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // lowest priority first
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        Ok(figment.merge(Self::env()).extract()?)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the standard locations; environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(Box::new(figment::Error::from(format!(
                "config file not found: {}",
                path.display()
            )))));
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Self::env())
            .extract()?;
        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    /// Config file paths in priority order (highest first)
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(format!("{}.toml", APP_NAME))];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_NAME);
        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc").join(APP_NAME).join("config.toml"));
        paths
    }

    /// Check values that deserialize fine but cannot be served
    pub fn validate(&self) -> Result<()> {
        let base = &self.api.base_path;
        if !base.starts_with('/') || base == "/" || base.ends_with('/') {
            return Err(invalid(format!(
                "api.base_path must start with '/' and must not end with '/', got '{}'",
                base
            )));
        }

        if matches!(self.api.api_key.as_deref(), Some("")) {
            return Err(invalid("api.api_key must not be empty when set"));
        }

        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections must be at least 1"));
        }

        Ok(())
    }

    /// The `host:port` address to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }

    /// Effective log filter; `debug` overrides `log_level`
    pub fn log_level(&self) -> &str {
        if self.service.debug {
            "debug"
        } else {
            &self.service.log_level
        }
    }

    /// A copy safe to print, with the API key masked
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.api.api_key.is_some() {
            config.api.api_key = Some("<redacted>".to_string());
        }
        config
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Config(Box::new(figment::Error::from(message.into())))
}
