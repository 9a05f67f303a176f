//! Data keys and their opaque serialized form.

use crate::error::{CryptoError, CryptoResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a data key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// A 256-bit symmetric key. Zeroed when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_SIZE]);

impl DataKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, rejecting anything that isn't exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataKey").field(&"[REDACTED]").finish()
    }
}

/// Generates a fresh random key from the OS CSPRNG.
///
/// An RNG failure is surfaced as [`CryptoError::KeyGeneration`]; there is no
/// fallback source.
pub fn generate_key() -> CryptoResult<DataKey> {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let key = DataKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Serializes a key to standard base64 for storage.
pub fn export_key(key: &DataKey) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Parses a key previously produced by [`export_key`].
pub fn import_key(encoded: &str) -> CryptoResult<DataKey> {
    let mut bytes = STANDARD.decode(encoded.trim())?;
    let key = DataKey::from_slice(&bytes);
    bytes.zeroize();
    key
}
