//! SQLite-backed storer
//!
//! Rows live in a single `statusthings` table. Writes run inside a
//! `sqlx` transaction; a transaction that is dropped before commit (for
//! example because the caller cancelled the future or the per-operation
//! deadline expired) is rolled back by `sqlx`.
//!
//! The deadline bounds the write transaction. Reading the stored row back
//! afterwards runs under a separate deadline reported as a
//! [`StorageOperation::Query`] timeout; by then the write has committed.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, error, instrument};

use super::StatusThingStorer;
use crate::error::{Error, Result, StorageError, StorageOperation};
use crate::filter::UpdateFilter;
use crate::model::{Status, StatusThing};

/// Name of the table holding status things
pub const TABLE_NAME: &str = "statusthings";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS statusthings (
    id VARCHAR(191) PRIMARY KEY,
    name VARCHAR(191) NOT NULL UNIQUE,
    description VARCHAR(191) DEFAULT NULL,
    status INT UNSIGNED NOT NULL
)";

const SELECT_ONE: &str = "SELECT id, name, description, status FROM statusthings WHERE id = ?";
const SELECT_ALL: &str = "SELECT id, name, description, status FROM statusthings ORDER BY id";
const INSERT: &str = "INSERT INTO statusthings (id, name, description, status) VALUES (?, ?, ?, ?)";
const UPDATE_STATUS: &str = "UPDATE statusthings SET status = ? WHERE id = ?";
const DELETE: &str = "DELETE FROM statusthings WHERE id = ?";

/// Options controlling a [`SqliteStorer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorerOptions {
    /// Create the table on construction if it does not exist
    pub create_table: bool,
    /// Deadline applied to each storer operation
    pub query_timeout: Option<Duration>,
}

impl Default for StorerOptions {
    fn default() -> Self {
        Self {
            create_table: true,
            query_timeout: None,
        }
    }
}

/// [`StatusThingStorer`] over a `sqlx` SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStorer {
    pool: SqlitePool,
    options: StorerOptions,
}

impl SqliteStorer {
    /// Create a storer, creating the schema first when `options.create_table` is set
    pub async fn new(pool: SqlitePool, options: StorerOptions) -> Result<Self> {
        let storer = Self { pool, options };
        if storer.options.create_table {
            storer.create_table().await?;
        }
        Ok(storer)
    }

    /// Create the `statusthings` table if it does not exist
    pub async fn create_table(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| storage(e, StorageOperation::Migration, TABLE_NAME))?;
        debug!(table = TABLE_NAME, "ensured table exists");
        Ok(())
    }

    /// The pool this storer runs against
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The options this storer was created with
    pub fn options(&self) -> &StorerOptions {
        &self.options
    }

    async fn with_deadline<T>(
        &self,
        operation: StorageOperation,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match self.options.query_timeout {
            Some(deadline) => tokio::time::timeout(deadline, fut).await.map_err(|_| {
                Error::Storage(StorageError::timeout(
                    operation,
                    format!("operation did not complete within {:?}", deadline),
                ))
            })?,
            None => fut.await,
        }
    }

    async fn fetch(&self, id: &str) -> Result<StatusThing> {
        let row = sqlx::query(SELECT_ONE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage(e, StorageOperation::Query, id))?;

        match row {
            Some(row) => {
                thing_from_row(&row).map_err(|e| storage(e, StorageOperation::Query, id))
            }
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<StatusThing>> {
        let rows = sqlx::query(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage(e, StorageOperation::Query, TABLE_NAME))?;

        rows.iter()
            .map(|row| thing_from_row(row).map_err(|e| storage(e, StorageOperation::Query, TABLE_NAME)))
            .collect()
    }

    /// Re-read a row after a committed write
    async fn read_back(&self, id: &str) -> Result<StatusThing> {
        self.with_deadline(StorageOperation::Query, self.fetch(id))
            .await
    }

    async fn insert_row(&self, thing: &StatusThing) -> Result<()> {
        let mut tx = begin(&self.pool, StorageOperation::Insert).await?;

        let result = sqlx::query(INSERT)
            .bind(&thing.id)
            .bind(&thing.name)
            .bind(&thing.description)
            .bind(thing.status.ordinal())
            .execute(&mut *tx)
            .await;

        if let Err(e) = result {
            let err = StorageError::from(e);
            let cause = if err.is_unique_violation() {
                Error::AlreadyExists(thing.name.clone())
            } else {
                storage(err, StorageOperation::Insert, &thing.id)
            };
            return Err(rollback(tx, StorageOperation::Insert, cause).await);
        }

        commit(tx, StorageOperation::Insert).await?;
        debug!(id = %thing.id, name = %thing.name, "inserted status thing");
        Ok(())
    }

    async fn update_row(&self, id: &str, filter: UpdateFilter) -> Result<()> {
        self.fetch(id).await?;
        if !filter.has_changes() {
            return Ok(());
        }

        let mut tx = begin(&self.pool, StorageOperation::Update).await?;

        let result = sqlx::query(UPDATE_STATUS)
            .bind(filter.status().ordinal())
            .bind(id)
            .execute(&mut *tx)
            .await;

        let cause = match result {
            Ok(done) => match done.rows_affected() {
                1 => None,
                // removed between the existence check and the update
                0 => Some(Error::NotFound(id.to_string())),
                n => Some(consistency_violation(StorageOperation::Update, id, n)),
            },
            Err(e) => Some(storage(e, StorageOperation::Update, id)),
        };
        if let Some(cause) = cause {
            return Err(rollback(tx, StorageOperation::Update, cause).await);
        }

        commit(tx, StorageOperation::Update).await?;
        debug!(id = %id, status = %filter.status(), "updated status thing");
        Ok(())
    }

    async fn delete_row(&self, id: &str) -> Result<()> {
        let mut tx = begin(&self.pool, StorageOperation::Delete).await?;

        let result = sqlx::query(DELETE).bind(id).execute(&mut *tx).await;

        let cause = match result {
            Ok(done) if done.rows_affected() > 1 => Some(consistency_violation(
                StorageOperation::Delete,
                id,
                done.rows_affected(),
            )),
            Ok(_) => None,
            Err(e) => Some(storage(e, StorageOperation::Delete, id)),
        };
        if let Some(cause) = cause {
            return Err(rollback(tx, StorageOperation::Delete, cause).await);
        }

        commit(tx, StorageOperation::Delete).await?;
        debug!(id = %id, "deleted status thing");
        Ok(())
    }
}

#[async_trait]
impl StatusThingStorer for SqliteStorer {
    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<StatusThing> {
        self.with_deadline(StorageOperation::Query, self.fetch(id))
            .await
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> Result<Vec<StatusThing>> {
        self.with_deadline(StorageOperation::Query, self.fetch_all())
            .await
    }

    #[instrument(skip(self, thing), fields(id = %thing.id, name = %thing.name))]
    async fn insert(&self, thing: StatusThing) -> Result<StatusThing> {
        self.with_deadline(StorageOperation::Insert, self.insert_row(&thing))
            .await?;
        self.read_back(&thing.id).await
    }

    #[instrument(skip(self))]
    async fn update(&self, id: &str, filter: UpdateFilter) -> Result<StatusThing> {
        self.with_deadline(StorageOperation::Update, self.update_row(id, filter))
            .await?;
        self.read_back(id).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<()> {
        self.with_deadline(StorageOperation::Delete, self.delete_row(id))
            .await
    }
}

fn thing_from_row(row: &SqliteRow) -> std::result::Result<StatusThing, sqlx::Error> {
    Ok(StatusThing {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row
            .try_get::<Option<String>, _>("description")?
            .unwrap_or_default(),
        status: Status::from_ordinal(row.try_get("status")?),
    })
}

fn storage(err: impl Into<StorageError>, operation: StorageOperation, context: &str) -> Error {
    Error::Storage(
        err.into()
            .with_operation(operation)
            .add_context(format!("{}: {}", TABLE_NAME, context)),
    )
}

fn consistency_violation(operation: StorageOperation, id: &str, affected: u64) -> Error {
    let err = StorageError::consistency_violation(
        operation,
        format!("expected at most one row for id, {} rows affected", affected),
    )
    .add_context(format!("{}: {}", TABLE_NAME, id));
    error!(error = %err, "refusing to commit");
    Error::Storage(err)
}

async fn begin(pool: &SqlitePool, operation: StorageOperation) -> Result<Transaction<'static, Sqlite>> {
    pool.begin().await.map_err(|e| {
        Error::Storage(
            StorageError::from(e)
                .with_operation(StorageOperation::Transaction)
                .add_context(format!("begin {}", operation)),
        )
    })
}

async fn commit(tx: Transaction<'_, Sqlite>, operation: StorageOperation) -> Result<()> {
    tx.commit().await.map_err(|e| {
        Error::Storage(
            StorageError::from(e)
                .with_operation(StorageOperation::Transaction)
                .add_context(format!("commit {}", operation)),
        )
    })
}

/// Roll back after `cause`, returning `cause` unless the rollback itself fails
async fn rollback(tx: Transaction<'_, Sqlite>, operation: StorageOperation, cause: Error) -> Error {
    match tx.rollback().await {
        Ok(()) => cause,
        Err(e) => {
            let rollback_err = StorageError::from(e).with_operation(StorageOperation::Transaction);
            let combined = StorageError::rollback_failed(operation, &cause, &rollback_err);
            error!(error = %combined, "transaction rollback failed");
            Error::Storage(combined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn storer() -> SqliteStorer {
        SqliteStorer::new(memory_pool().await, StorerOptions::default())
            .await
            .unwrap()
    }

    fn thing(id: &str, name: &str, status: Status) -> StatusThing {
        StatusThing {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{} description", name),
            status,
        }
    }

    async fn row_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM statusthings")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_table_is_idempotent() {
        let storer = storer().await;
        storer.create_table().await.unwrap();
        assert!(storer.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let storer = storer().await;
        let stored = storer.insert(thing("t1", "svc-a", Status::Green)).await.unwrap();
        assert_eq!(stored, thing("t1", "svc-a", Status::Green));

        let fetched = storer.get("t1").await.unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let storer = storer().await;
        let err = storer.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_already_exists() {
        let storer = storer().await;
        storer.insert(thing("t1", "svc-a", Status::Green)).await.unwrap();

        let err = storer
            .insert(thing("t2", "svc-a", Status::Red))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(row_count(storer.pool()).await, 1);
    }

    #[tokio::test]
    async fn test_get_all_returns_every_row() {
        let storer = storer().await;
        storer.insert(thing("t1", "svc-a", Status::Green)).await.unwrap();
        storer.insert(thing("t2", "svc-b", Status::Yellow)).await.unwrap();

        let all = storer.get_all().await.unwrap();
        let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["svc-a", "svc-b"]);
    }

    #[tokio::test]
    async fn test_null_description_reads_back_empty() {
        let storer = storer().await;
        sqlx::query("INSERT INTO statusthings (id, name, status) VALUES ('t1', 'svc-a', 1)")
            .execute(storer.pool())
            .await
            .unwrap();

        let fetched = storer.get("t1").await.unwrap();
        assert_eq!(fetched.description, "");
        assert_eq!(fetched.status, Status::Red);
    }

    #[tokio::test]
    async fn test_update_changes_only_target_row() {
        let storer = storer().await;
        storer.insert(thing("t1", "svc-a", Status::Green)).await.unwrap();
        storer.insert(thing("t2", "svc-b", Status::Green)).await.unwrap();

        let filter = UpdateFilter::builder().with_status(Status::Red).build().unwrap();
        let updated = storer.update("t1", filter).await.unwrap();
        assert_eq!(updated, thing("t1", "svc-a", Status::Red));

        let untouched = storer.get("t2").await.unwrap();
        assert_eq!(untouched.status, Status::Green);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let storer = storer().await;
        let filter = UpdateFilter::builder().with_status(Status::Red).build().unwrap();
        let err = storer.update("missing", filter).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_without_changes_returns_current() {
        let storer = storer().await;
        storer.insert(thing("t1", "svc-a", Status::Yellow)).await.unwrap();

        let current = storer.update("t1", UpdateFilter::default()).await.unwrap();
        assert_eq!(current.status, Status::Yellow);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let storer = storer().await;
        storer.insert(thing("t1", "svc-a", Status::Green)).await.unwrap();

        storer.delete("t1").await.unwrap();
        assert!(storer.get("t1").await.unwrap_err().is_not_found());

        storer.delete("t1").await.unwrap();
        storer.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_matching_several_rows_rolls_back() {
        let pool = memory_pool().await;
        // no key constraints, so the same id can be stored twice
        sqlx::query("CREATE TABLE statusthings (id TEXT, name TEXT, description TEXT, status INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO statusthings VALUES ('dup', 'a', 'd', 1), ('dup', 'b', 'd', 2)")
            .execute(&pool)
            .await
            .unwrap();

        let options = StorerOptions {
            create_table: false,
            ..StorerOptions::default()
        };
        let storer = SqliteStorer::new(pool.clone(), options).await.unwrap();

        match storer.delete("dup").await.unwrap_err() {
            Error::Storage(e) => assert_eq!(e.kind, StorageErrorKind::ConsistencyViolation),
            other => panic!("expected storage error, got {other:?}"),
        }
        assert_eq!(row_count(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_operation_deadline() {
        let pool = memory_pool().await;
        let options = StorerOptions {
            create_table: true,
            query_timeout: Some(Duration::from_millis(50)),
        };
        let storer = SqliteStorer::new(pool.clone(), options).await.unwrap();

        // hold the only connection so the query cannot start
        let _conn = pool.acquire().await.unwrap();

        match storer.get_all().await.unwrap_err() {
            Error::Storage(e) => {
                assert_eq!(e.kind, StorageErrorKind::Timeout);
                assert_eq!(e.operation, StorageOperation::Query);
            }
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    async fn storer_with_deadline(pool: &SqlitePool) -> SqliteStorer {
        let options = StorerOptions {
            create_table: true,
            query_timeout: Some(Duration::from_millis(50)),
        };
        SqliteStorer::new(pool.clone(), options).await.unwrap()
    }

    fn expect_timeout(err: Error, operation: StorageOperation) {
        match err {
            Error::Storage(e) => {
                assert_eq!(e.kind, StorageErrorKind::Timeout);
                assert_eq!(e.operation, operation);
            }
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_insert_deadline_leaves_no_row() {
        let pool = memory_pool().await;
        let storer = storer_with_deadline(&pool).await;

        let conn = pool.acquire().await.unwrap();
        let err = storer
            .insert(thing("t1", "svc-a", Status::Green))
            .await
            .unwrap_err();
        expect_timeout(err, StorageOperation::Insert);
        drop(conn);

        assert_eq!(row_count(&pool).await, 0);
        assert!(storer.get("t1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_deadline_keeps_previous_status() {
        let pool = memory_pool().await;
        let storer = storer_with_deadline(&pool).await;
        storer.insert(thing("t1", "svc-a", Status::Green)).await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let filter = UpdateFilter::builder().with_status(Status::Red).build().unwrap();
        expect_timeout(storer.update("t1", filter).await.unwrap_err(), StorageOperation::Update);
        drop(conn);

        assert_eq!(row_count(&pool).await, 1);
        assert_eq!(storer.get("t1").await.unwrap().status, Status::Green);
    }

    #[tokio::test]
    async fn test_read_back_deadline_follows_commit() {
        let pool = memory_pool().await;
        let storer = storer_with_deadline(&pool).await;
        let written = thing("t1", "svc-a", Status::Yellow);

        storer.insert_row(&written).await.unwrap();

        // the write is committed; only the read back runs out of time
        let conn = pool.acquire().await.unwrap();
        expect_timeout(storer.read_back("t1").await.unwrap_err(), StorageOperation::Query);
        drop(conn);

        assert_eq!(storer.get("t1").await.unwrap(), written);
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_both_errors() {
        let storer = storer().await;
        // RAISE(ROLLBACK) ends the transaction, so the storer's own rollback fails
        sqlx::query(
            "CREATE TRIGGER refuse_insert BEFORE INSERT ON statusthings \
             BEGIN SELECT RAISE(ROLLBACK, 'insert refused'); END",
        )
        .execute(storer.pool())
        .await
        .unwrap();

        match storer.insert(thing("t1", "svc-a", Status::Green)).await.unwrap_err() {
            Error::Storage(e) => {
                assert_eq!(e.kind, StorageErrorKind::RollbackFailed);
                assert_eq!(e.operation, StorageOperation::Insert);
                assert!(e.message.contains("insert refused"), "{}", e.message);
                assert!(e.message.contains("no transaction is active"), "{}", e.message);
            }
            other => panic!("expected storage error, got {other:?}"),
        }
    }
}
