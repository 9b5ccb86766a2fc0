//! SQLite connection pool management

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result, StorageError, StorageOperation};

/// Create a SQLite connection pool with retry logic
///
/// The database file is created if it does not exist. In-memory URLs are
/// limited to a single connection, since every SQLite in-memory connection
/// opens its own private database.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Database connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Database connection pool created: url={}, max={}",
                        config.url,
                        max_connections(config)
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to database after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));

                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Attempt to create a pool (single try)
async fn try_create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| connect_error(e, config))?
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(max_connections(config))
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs));
    if is_in_memory(&config.url) {
        // dropping the last connection would discard the database
        pool_options = pool_options
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
    }

    pool_options
        .connect_with(options)
        .await
        .map_err(|e| connect_error(e, config))
}

fn connect_error(err: sqlx::Error, config: &DatabaseConfig) -> Error {
    let category = categorize_db_error(&err);
    Error::Storage(
        StorageError::from(err)
            .with_operation(StorageOperation::Connect)
            .add_context(format!("{} ({})", config.url, category)),
    )
}

fn max_connections(config: &DatabaseConfig) -> u32 {
    if is_in_memory(&config.url) {
        1
    } else {
        config.max_connections
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Categorize database error for better user guidance
fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    use sqlx::Error;
    match err {
        Error::Configuration(_) => "Configuration error - check the sqlite:// URL",
        Error::Database(_) => "Database error - the file may not be a SQLite database",
        Error::Io(_) => "I/O error - check the directory exists and is writable",
        Error::PoolTimedOut => "Connection pool timeout - database may be locked",
        Error::PoolClosed => "Connection pool closed",
        Error::WorkerCrashed => "Database worker crashed",
        _ => "Connection error",
    }
}
