//! Persisted key records.
//!
//! Layout per user:
//! - `key:{user}:current` holds the live record
//! - `key:{user}:v{version:010}` holds each archived version
//!
//! The current record is only ever replaced through compare-and-swap, so two
//! writers racing on the same user cannot both succeed.

use crate::error::{VaultError, VaultResult};
use chrono::{DateTime, Utc};
use haven_crypto::{DataKey, import_key};
use haven_storage::{KeyValueStore, key_segment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const KEY_PREFIX: &str = "key:";

/// A user's data key as stored, with its version and schedule.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub user_id: String,
    /// Standard base64 of the raw key bytes.
    pub key: String,
    pub key_version: u32,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    pub next_rotation_at: DateTime<Utc>,
}

impl KeyRecord {
    pub fn data_key(&self) -> VaultResult<DataKey> {
        Ok(import_key(&self.key)?)
    }

    pub fn is_rotation_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_rotation_at
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("user_id", &self.user_id)
            .field("key", &"[REDACTED]")
            .field("key_version", &self.key_version)
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .field("next_rotation_at", &self.next_rotation_at)
            .finish()
    }
}

/// The current record plus the exact bytes it was read from, for CAS.
pub struct CurrentKey {
    pub record: KeyRecord,
    pub raw: Vec<u8>,
}

#[derive(Clone)]
pub struct KeyStore {
    store: Arc<dyn KeyValueStore>,
}

impl KeyStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn current_key(user_id: &str) -> String {
        format!("{KEY_PREFIX}{}:current", key_segment(user_id))
    }

    fn version_prefix(user_id: &str) -> String {
        format!("{KEY_PREFIX}{}:v", key_segment(user_id))
    }

    fn version_key(user_id: &str, version: u32) -> String {
        format!("{}{version:010}", Self::version_prefix(user_id))
    }

    pub async fn load_current(&self, user_id: &str) -> VaultResult<Option<CurrentKey>> {
        match self.store.get(&Self::current_key(user_id)).await? {
            Some(raw) => {
                let record = serde_json::from_slice(&raw)?;
                Ok(Some(CurrentKey { record, raw }))
            }
            None => Ok(None),
        }
    }

    pub async fn load_version(&self, user_id: &str, version: u32) -> VaultResult<Option<KeyRecord>> {
        match self.store.get(&Self::version_key(user_id, version)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Replaces the current record if it still equals `expected`
    /// (`None` = no record yet). Returns whether the swap happened.
    pub async fn swap_current(
        &self,
        user_id: &str,
        expected: Option<&[u8]>,
        record: &KeyRecord,
    ) -> VaultResult<bool> {
        if record.user_id != user_id {
            return Err(VaultError::InvalidRecord(format!(
                "key record for {} written under {user_id}",
                record.user_id
            )));
        }
        let bytes = serde_json::to_vec(record)?;
        Ok(self
            .store
            .compare_and_swap(&Self::current_key(user_id), expected, bytes)
            .await?)
    }

    /// Stores a record under its version. Rewriting the same version is a no-op
    /// in effect.
    pub async fn archive(&self, record: &KeyRecord) -> VaultResult<()> {
        let key = Self::version_key(&record.user_id, record.key_version);
        self.store.set(&key, serde_json::to_vec(record)?).await?;
        Ok(())
    }

    /// Archived versions for a user, ascending.
    pub async fn archived_versions(&self, user_id: &str) -> VaultResult<Vec<u32>> {
        let prefix = Self::version_prefix(user_id);
        let entries = self.store.scan_prefix(&prefix).await?;
        Ok(entries
            .iter()
            .filter_map(|(key, _)| key.strip_prefix(&prefix)?.parse().ok())
            .collect())
    }

    pub async fn remove_version(&self, user_id: &str, version: u32) -> VaultResult<bool> {
        Ok(self.store.delete(&Self::version_key(user_id, version)).await?)
    }
}
