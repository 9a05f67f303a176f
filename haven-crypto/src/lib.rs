//! Encryption primitives for Haven.
//!
//! Provides the building blocks used by the vault layer:
//! - AES-256-GCM authenticated encryption behind the [`Cipher`] trait
//! - 256-bit data keys with zeroization and redacted `Debug`
//! - Opaque key export/import (standard base64 of the raw bytes)
//!
//! # Nonce discipline
//!
//! Every call to [`Cipher::encrypt`] draws a fresh 96-bit nonce from the
//! operating system CSPRNG. Nonces are never derived from counters or reused,
//! so two encryptions of the same plaintext under the same key produce
//! unrelated ciphertexts.

mod cipher;
mod error;
mod key;

pub use cipher::{ALGORITHM, Aes256GcmCipher, Cipher, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{DataKey, KEY_SIZE, export_key, generate_key, import_key};
