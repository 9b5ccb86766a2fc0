//! Error types for the statusthing crate
//!
//! Two layers of errors live here:
//! - [`Error`]: the crate-wide error. Its `NotFound`, `AlreadyExists` and
//!   `RequiredValueMissing` variants are the domain taxonomy callers match on.
//! - [`StorageError`]: structured, opaque storage failures carrying the
//!   operation and category that failed. These are logged, never shown to
//!   HTTP clients.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Structured Storage Errors
// ============================================================================

/// Storage operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    /// Establishing a connection or pool
    Connect,
    /// Reading rows
    Query,
    /// Inserting a row
    Insert,
    /// Updating a row
    Update,
    /// Deleting a row
    Delete,
    /// Transaction control (begin, commit, rollback)
    Transaction,
    /// Creating the schema
    Migration,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Query => write!(f, "query"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Transaction => write!(f, "transaction"),
            Self::Migration => write!(f, "migration"),
        }
    }
}

/// Category of storage error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// Failed to establish connection
    ConnectionFailed,
    /// Row not found
    NotFound,
    /// Unique constraint violation
    UniqueViolation,
    /// Any other constraint violation (foreign key, check, not null)
    ConstraintViolation,
    /// Query execution failed
    QueryFailed,
    /// Rollback failed after another error
    RollbackFailed,
    /// Stored data contradicts an invariant (e.g. an id matching several rows)
    ConsistencyViolation,
    /// Column decoding failed
    TypeConversion,
    /// Invalid connection configuration
    Configuration,
    /// Operation exceeded its deadline
    Timeout,
    /// No connection available in the pool
    PoolExhausted,
    /// Other/unknown error
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::NotFound => write!(f, "not_found"),
            Self::UniqueViolation => write!(f, "unique_violation"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::RollbackFailed => write!(f, "rollback_failed"),
            Self::ConsistencyViolation => write!(f, "consistency_violation"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Configuration => write!(f, "configuration"),
            Self::Timeout => write!(f, "timeout"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured storage error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    /// The operation being performed when the error occurred
    pub operation: StorageOperation,
    /// The category of error
    pub kind: StorageErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (e.g. table name, record id)
    pub context: Option<String>,
}

impl StorageError {
    /// Create a new storage error
    pub fn new(
        operation: StorageOperation,
        kind: StorageErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::Timeout, message)
    }

    /// Create a consistency violation error
    pub fn consistency_violation(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::ConsistencyViolation, message)
    }

    /// Combine an original failure with the rollback failure that followed it
    ///
    /// The message names both errors so neither is lost.
    pub fn rollback_failed(
        operation: StorageOperation,
        cause: &Error,
        rollback: &StorageError,
    ) -> Self {
        Self::new(
            operation,
            StorageErrorKind::RollbackFailed,
            format!(
                "unable to rollback transaction for original error ({}): {}",
                cause, rollback
            ),
        )
    }

    /// Add context to an existing error
    #[must_use]
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: StorageOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the backend reported a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        self.kind == StorageErrorKind::UniqueViolation
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StorageErrorKind::ConnectionFailed
                | StorageErrorKind::Timeout
                | StorageErrorKind::PoolExhausted
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [context: {}]", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::RowNotFound => Self::new(
                StorageOperation::Query,
                StorageErrorKind::NotFound,
                "Row not found",
            ),
            E::PoolTimedOut => Self::new(
                StorageOperation::Connect,
                StorageErrorKind::PoolExhausted,
                "Connection pool timed out",
            ),
            E::PoolClosed => Self::new(
                StorageOperation::Connect,
                StorageErrorKind::ConnectionFailed,
                "Connection pool is closed",
            ),
            E::Configuration(e) => Self::new(
                StorageOperation::Connect,
                StorageErrorKind::Configuration,
                e.to_string(),
            ),
            E::Io(e) => Self::new(
                StorageOperation::Connect,
                StorageErrorKind::ConnectionFailed,
                e.to_string(),
            ),
            E::ColumnNotFound(col) => Self::new(
                StorageOperation::Query,
                StorageErrorKind::QueryFailed,
                format!("Column not found: {}", col),
            ),
            E::ColumnDecode { index, source } => Self::new(
                StorageOperation::Query,
                StorageErrorKind::TypeConversion,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::new(
                StorageOperation::Query,
                StorageErrorKind::TypeConversion,
                e.to_string(),
            ),
            E::Database(db_err) => {
                let kind = if db_err.is_unique_violation() {
                    StorageErrorKind::UniqueViolation
                } else if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
                    StorageErrorKind::ConstraintViolation
                } else {
                    StorageErrorKind::QueryFailed
                };
                Self::new(StorageOperation::Query, kind, db_err.to_string())
            }
            E::WorkerCrashed => Self::new(
                StorageOperation::Connect,
                StorageErrorKind::ConnectionFailed,
                "Database worker crashed",
            ),
            _ => Self::new(
                StorageOperation::Query,
                StorageErrorKind::Other,
                err.to_string(),
            ),
        }
    }
}

// ============================================================================
// Crate Error
// ============================================================================

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// No record matches the requested id
    #[error("record not found: {0}")]
    NotFound(String),

    /// A record with the same unique name already exists
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// Caller input failed validation
    #[error("invalid value provided: {0}")]
    RequiredValueMissing(String),

    /// Opaque storage failure
    #[error("{0}")]
    Storage(StorageError),

    /// The capability is not implemented by this component
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this is a `NotFound` error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this is an `AlreadyExists` error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Whether this is a `RequiredValueMissing` error
    pub fn is_required_value_missing(&self) -> bool {
        matches!(self, Self::RequiredValueMissing(_))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(StorageError::from(err))
    }
}
