use std::path::PathBuf;

use anyhow::{Context, Result};
use statusthing::app::App;
use statusthing::observability::init_tracing;

use super::{load_config, Overrides};

pub async fn execute(config_path: Option<PathBuf>, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path.as_deref(), &overrides)?;

    init_tracing(&config).context("Failed to initialize logging")?;

    let app = App::from_config(config)
        .await
        .context("Failed to open the status thing database")?;

    app.serve().await.context("Server error")
}
