//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("store lock poisoned: {0}")]
    Lock(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
