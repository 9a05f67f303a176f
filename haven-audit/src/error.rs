//! Audit error types.

use haven_storage::StorageError;
use thiserror::Error;

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    /// An event could not be persisted. It has been queued for retry.
    #[error("audit write failed: {0}")]
    Write(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("janitor engine stopped")]
    EngineStopped,
}
