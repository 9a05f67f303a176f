//! AEAD cipher abstraction and the AES-256-GCM implementation.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DataKey;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Nonce size in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Algorithm label persisted alongside key records.
pub const ALGORITHM: &str = "AES-256-GCM";

/// Ciphertext (with appended tag) plus the nonce it was sealed under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

impl EncryptedData {
    /// Reassembles sealed data from its parts, validating the nonce length.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8]) -> CryptoResult<Self> {
        let nonce: [u8; NONCE_SIZE] =
            nonce
                .try_into()
                .map_err(|_| CryptoError::InvalidNonceLength {
                    expected: NONCE_SIZE,
                    actual: nonce.len(),
                })?;
        Ok(Self { ciphertext, nonce })
    }
}

/// Stateless authenticated encryption.
///
/// Implementations must draw a fresh nonce on every `encrypt` and must fail
/// closed in `decrypt`: a tag mismatch or malformed input is an error, never
/// partial plaintext.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, key: &DataKey, plaintext: &[u8]) -> CryptoResult<EncryptedData>;

    fn decrypt(&self, key: &DataKey, data: &EncryptedData) -> CryptoResult<Vec<u8>>;

    /// Algorithm name recorded in key records.
    fn algorithm(&self) -> &'static str;
}

/// AES-256-GCM with random 96-bit nonces.
#[derive(Clone, Copy, Debug, Default)]
pub struct Aes256GcmCipher;

impl Aes256GcmCipher {
    pub fn new() -> Self {
        Self
    }

    fn fresh_nonce() -> CryptoResult<[u8; NONCE_SIZE]> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CryptoError::Encryption(format!("nonce generation failed: {e}")))?;
        Ok(nonce)
    }
}

impl Cipher for Aes256GcmCipher {
    fn encrypt(&self, key: &DataKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let nonce = Self::fresh_nonce()?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(EncryptedData { ciphertext, nonce })
    }

    fn decrypt(&self, key: &DataKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
        if data.ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::Decryption(format!(
                "ciphertext too short: {} bytes",
                data.ciphertext.len()
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(&data.nonce), data.ciphertext.as_slice())
            .map_err(|_| {
                CryptoError::Decryption("authentication failed (wrong key or tampered data)".into())
            })
    }

    fn algorithm(&self) -> &'static str {
        ALGORITHM
    }
}
