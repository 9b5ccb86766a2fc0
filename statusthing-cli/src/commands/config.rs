use std::path::PathBuf;

use anyhow::{Context, Result};
use statusthing::config::Config;

use super::{load_config, Overrides};

pub fn execute(config_path: Option<PathBuf>, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path.as_deref(), &overrides)?;
    print!("{}", render(&config)?);
    Ok(())
}

/// The configuration as TOML, with secrets masked
fn render(config: &Config) -> Result<String> {
    toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")
}
