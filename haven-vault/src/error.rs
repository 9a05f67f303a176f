//! Vault error types.

use haven_audit::AuditError;
use haven_crypto::CryptoError;
use haven_storage::StorageError;
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no key version {version} for user {user_id}")]
    KeyNotFound { user_id: String, version: u32 },

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Another writer replaced the current key record mid-rotation.
    #[error("concurrent key rotation for user {0}")]
    RotationConflict(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption(msg) => VaultError::Decryption(msg),
            CryptoError::KeyGeneration(msg) => VaultError::KeyGeneration(msg),
            other => VaultError::Crypto(other),
        }
    }
}
