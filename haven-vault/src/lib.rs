//! Per-user key management and field-level encryption for Haven.
//!
//! - [`KeyManager`] owns every user's data key: creation, rotation, version
//!   history and the rotation schedule
//! - [`FieldEncryptor`] seals sensitive record fields under the current key
//!   and opens them with whichever version sealed them
//! - [`KeyMigration`] moves old ciphertext forward to the current key
//!
//! Key material never leaves this crate except through [`RotatedKey`] and
//! the explicit export/import helpers.

pub mod config;
pub mod error;
pub mod field;
pub mod key_manager;
pub mod key_store;
pub mod migration;

pub use config::{HavenConfig, KeyPolicy};
pub use error::{VaultError, VaultResult};
pub use field::{DecryptedRecord, EncryptedField, FieldEncryptor, FieldFailure};
pub use key_manager::{KeyManager, RotatedKey};
pub use key_store::{CurrentKey, KeyRecord, KeyStore};
pub use migration::{KeyMigration, MigrationOutcome};
