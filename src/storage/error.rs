//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a storage backend
///
/// None of these are fatal to the pipeline: the scheduler abandons the cycle on a failed
/// snapshot, the sink logs a failed append and moves on.
#[derive(Debug)]
pub enum StorageError {
    /// The database could not be opened or reached
    ConnectionFailed(String),

    /// A statement was rejected or failed while running
    QueryFailed(String),

    /// The schema could not be brought up to date
    MigrationFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout
    PoolExhausted,

    /// The database file could not be read or written
    Io(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => write!(f, "cannot reach database: {}", msg),
            StorageError::QueryFailed(msg) => write!(f, "query failed: {}", msg),
            StorageError::MigrationFailed(msg) => write!(f, "schema migration failed: {}", msg),
            StorageError::PoolExhausted => {
                write!(f, "timed out waiting for a database connection")
            }
            StorageError::Io(err) => write!(f, "database file error: {}", err),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::Io(io_err),
            sqlx::Error::PoolTimedOut => StorageError::PoolExhausted,
            sqlx::Error::PoolClosed => StorageError::ConnectionFailed(err.to_string()),
            other => StorageError::QueryFailed(other.to_string()),
        }
    }
}
