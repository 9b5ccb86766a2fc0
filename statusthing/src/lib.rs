//! # statusthing
//!
//! HTTP service tracking named "status things", each holding a red, yellow,
//! green or unknown status, persisted in SQLite.
//!
//! ## Layers
//!
//! - **Handlers** ([`handlers`]): axum routes under a configurable base path,
//!   with API key and content-type checks
//! - **Provider** ([`provider`]): validation and id assignment
//! - **Storer** ([`storer`]): transactional persistence via `sqlx`
//! - **Update filters** ([`filter`]): validated partial updates
//!
//! ## Example
//!
//! ```rust,no_run
//! use statusthing::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // Open the database and serve until SIGINT/SIGTERM
//!     App::from_config(config).await?.serve().await
//! }
//! ```

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod ids;
pub mod model;
pub mod observability;
pub mod provider;
pub mod server;
pub mod storer;

/// Commonly used types
pub mod prelude {
    pub use crate::app::{App, AppBuilder};
    pub use crate::config::{ApiConfig, Config, DatabaseConfig, ServiceConfig};
    pub use crate::error::{Error, Result, StorageError, StorageErrorKind, StorageOperation};
    pub use crate::filter::{UpdateFilter, UpdateFilterBuilder, UpdateOption};
    pub use crate::handlers::{ApiError, ApiErrorKind, ErrorResponse, API_KEY_HEADER};
    pub use crate::ids::{MakeTypedRequestId, RequestId, ThingId};
    pub use crate::model::{NewStatusThing, Status, StatusThing};
    pub use crate::observability::init_tracing;
    pub use crate::provider::{Provider, StatusThingProvider, UnimplementedProvider};
    pub use crate::server::Server;
    pub use crate::storer::{SqliteStorer, StatusThingStorer, StorerOptions, UnimplementedStorer};
}
