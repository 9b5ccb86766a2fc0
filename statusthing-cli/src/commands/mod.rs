pub mod config;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use statusthing::config::{Config, DatabaseConfig};

/// Command-line overrides, applied on top of the loaded configuration
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Address to listen on, as HOST:PORT or :PORT
    #[arg(long, value_name = "HOST:PORT", env = "STATUSTHING_ADDR")]
    pub addr: Option<String>,

    /// SQLite database file
    #[arg(long, value_name = "PATH", env = "STATUSTHING_DBFILE")]
    pub db_file: Option<PathBuf>,

    /// Shared secret required in the X-STATUSTHING-KEY header
    #[arg(long, value_name = "KEY", env = "STATUSTHING_APIKEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path the API is mounted under
    #[arg(long, value_name = "PATH", env = "STATUSTHING_BASEPATH")]
    pub base_path: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "STATUSTHING_DEBUG")]
    pub debug: bool,
}

impl Overrides {
    /// Apply every override that was given
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(addr) = &self.addr {
            let (host, port) = parse_addr(addr)?;
            if let Some(host) = host {
                config.service.host = host;
            }
            config.service.port = port;
        }
        if let Some(path) = &self.db_file {
            config.database.url = DatabaseConfig::url_for_file(path);
        }
        if let Some(key) = &self.api_key {
            config.api.api_key = Some(key.clone());
        }
        if let Some(base_path) = &self.base_path {
            config.api.base_path = base_path.clone();
        }
        if self.debug {
            config.service.debug = true;
        }
        Ok(())
    }
}

/// Load configuration, apply overrides and validate the result
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    overrides.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Split `HOST:PORT`; an empty host (`:9000`) keeps the configured one
fn parse_addr(addr: &str) -> Result<(Option<String>, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("Invalid address '{}': expected HOST:PORT", addr))?;
    let port = port
        .parse::<u16>()
        .with_context(|| format!("Invalid port in address '{}'", addr))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    Ok(((!host.is_empty()).then(|| host.to_string()), port))
}
