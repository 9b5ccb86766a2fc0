//! Application wiring
//!
//! An [`App`] combines a [`Provider`] with the configuration and serves the
//! API and health routes. Build one with [`AppBuilder`], supplying either a
//! storer (wrapped in a [`StatusThingProvider`]) or a ready-made provider,
//! or let [`App::from_config`] open the configured database.
//!
//! ```rust,no_run
//! use statusthing::prelude::*;
//!
//! # async fn run() -> statusthing::error::Result<()> {
//! let config = Config::load()?;
//! App::from_config(config).await?.serve().await
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::database;
use crate::error::{Error, Result};
use crate::handlers::{api_router, health_router, RequestGuard};
use crate::provider::{Provider, StatusThingProvider};
use crate::server::Server;
use crate::storer::{SqliteStorer, StatusThingStorer};

/// Builder for [`App`]
///
/// Options apply in order; a later call of the same option replaces the
/// earlier value. Exactly one of [`with_storer`](Self::with_storer) and
/// [`with_provider`](Self::with_provider) must be used.
#[derive(Default)]
pub struct AppBuilder {
    config: Option<Config>,
    storer: Option<Arc<dyn StatusThingStorer>>,
    provider: Option<Arc<dyn Provider>>,
    pool: Option<SqlitePool>,
}

impl AppBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration instead of the defaults
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Serve a [`StatusThingProvider`] over this storer
    #[must_use]
    pub fn with_storer(mut self, storer: Arc<dyn StatusThingStorer>) -> Self {
        self.storer = Some(storer);
        self
    }

    /// Serve this provider directly
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Pool probed by the readiness route and closed on shutdown
    #[must_use]
    pub fn with_pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validate the options and build the app
    pub fn build(self) -> Result<App> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let provider = match (self.storer, self.provider) {
            (Some(_), Some(_)) => {
                return Err(invalid_options("a storer and a provider cannot both be supplied"))
            }
            (None, None) => return Err(invalid_options("either a storer or a provider is required")),
            (Some(storer), None) => Arc::new(StatusThingProvider::new(storer)) as Arc<dyn Provider>,
            (None, Some(provider)) => provider,
        };

        Ok(App {
            config,
            provider,
            pool: self.pool,
        })
    }
}

fn invalid_options(message: &str) -> Error {
    Error::Config(Box::new(figment::Error::from(message.to_string())))
}

/// A configured statusthing service
pub struct App {
    config: Config,
    provider: Arc<dyn Provider>,
    pool: Option<SqlitePool>,
}

impl App {
    /// Start building an app
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Open the configured database and serve a SQLite-backed provider
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let pool = database::create_pool(&config.database).await?;
        let storer = SqliteStorer::new(pool.clone(), config.database.storer_options()).await?;

        App::builder()
            .with_config(config)
            .with_storer(Arc::new(storer))
            .with_pool(pool)
            .build()
    }

    /// The effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// API and health routes, without the server middleware stack
    pub fn router(&self) -> Router {
        let guard = RequestGuard::new(self.config.api.api_key.clone());
        api_router(&self.config.api.base_path, self.provider.clone(), guard)
            .merge(health_router(&self.config.service.name, self.pool.clone()))
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn serve(self) -> Result<()> {
        let router = self.router();
        let result = Server::new(self.config.clone()).serve(router).await;
        self.close().await;
        result
    }

    /// Serve until `shutdown` completes
    pub async fn serve_with_shutdown(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.router();
        let result = Server::new(self.config.clone())
            .serve_with_shutdown(router, shutdown)
            .await;
        self.close().await;
        result
    }

    async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            tracing::info!("Database pool closed");
        }
    }
}
