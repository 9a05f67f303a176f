//! Per-user data keys: creation, rotation and version lookup.
//!
//! Every rotation archives the outgoing record under its version before the
//! current record is swapped, so ciphertext sealed under any retained version
//! stays decryptable. Rotations for one user are serialized in-process by a
//! per-user mutex; the store-level compare-and-swap catches writers in other
//! processes.

use crate::config::KeyPolicy;
use crate::error::{VaultError, VaultResult};
use crate::key_store::{CurrentKey, KeyRecord, KeyStore};
use chrono::{DateTime, Duration, Utc};
use haven_crypto::{Cipher, DataKey};
use haven_storage::KeyValueStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a rotation: both keys, so callers can re-encrypt eagerly.
#[derive(Debug)]
pub struct RotatedKey {
    pub old_key: DataKey,
    pub new_key: DataKey,
    pub old_version: u32,
    pub new_version: u32,
}

pub struct KeyManager {
    keys: KeyStore,
    cipher: Arc<dyn Cipher>,
    policy: KeyPolicy,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyValueStore>, cipher: Arc<dyn Cipher>, policy: KeyPolicy) -> Self {
        Self {
            keys: KeyStore::new(store),
            cipher,
            policy,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cipher(&self) -> &Arc<dyn Cipher> {
        &self.cipher
    }

    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Fresh random 256-bit key.
    pub fn generate_key() -> VaultResult<DataKey> {
        Ok(haven_crypto::generate_key()?)
    }

    pub fn export_key(key: &DataKey) -> String {
        haven_crypto::export_key(key)
    }

    pub fn import_key(encoded: &str) -> VaultResult<DataKey> {
        Ok(haven_crypto::import_key(encoded)?)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Drops the user's lock entry once no other task holds or awaits it.
    /// The caller's guard must already be released.
    async fn release_user_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        // One reference in the map, one held by the caller.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(user_id);
        }
    }

    fn new_record(&self, user_id: &str, key: &DataKey, version: u32, now: DateTime<Utc>) -> KeyRecord {
        KeyRecord {
            user_id: user_id.to_string(),
            key: Self::export_key(key),
            key_version: version,
            algorithm: self.cipher.algorithm().to_string(),
            created_at: now,
            next_rotation_at: Duration::try_days(self.policy.rotation_interval_days)
                .and_then(|interval| now.checked_add_signed(interval))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Loads the current record, creating version 1 if the user has none.
    /// Callers hold the user's lock.
    async fn ensure_current(&self, user_id: &str) -> VaultResult<CurrentKey> {
        if let Some(current) = self.keys.load_current(user_id).await? {
            return Ok(current);
        }

        let key = Self::generate_key()?;
        let record = self.new_record(user_id, &key, 1, Utc::now());
        if self.keys.swap_current(user_id, None, &record).await? {
            info!("created key version 1 for user {user_id}");
        } else {
            debug!("key for user {user_id} created concurrently, using theirs");
        }

        self.keys
            .load_current(user_id)
            .await?
            .ok_or_else(|| VaultError::KeyNotFound {
                user_id: user_id.to_string(),
                version: 1,
            })
    }

    /// Returns the user's current key and version, creating version 1 on first use.
    pub async fn get_or_create_user_key(&self, user_id: &str) -> VaultResult<(DataKey, u32)> {
        let current = match self.keys.load_current(user_id).await? {
            Some(current) => current,
            None => {
                let lock = self.user_lock(user_id).await;
                let guard = lock.lock().await;
                let created = self.ensure_current(user_id).await;
                drop(guard);
                self.release_user_lock(user_id, lock).await;
                created?
            }
        };
        Ok((current.record.data_key()?, current.record.key_version))
    }

    /// Current key version, if the user has a key.
    pub async fn current_version(&self, user_id: &str) -> VaultResult<Option<u32>> {
        Ok(self
            .keys
            .load_current(user_id)
            .await?
            .map(|c| c.record.key_version))
    }

    /// Replaces the user's key with a fresh one at the next version.
    ///
    /// A user without a key gets version 1 first, so the first rotation
    /// yields version 2.
    pub async fn rotate_user_key(&self, user_id: &str) -> VaultResult<RotatedKey> {
        let lock = self.user_lock(user_id).await;
        let guard = lock.lock().await;
        let rotated = self.rotate_locked(user_id).await;
        drop(guard);
        self.release_user_lock(user_id, lock).await;
        rotated
    }

    async fn rotate_locked(&self, user_id: &str) -> VaultResult<RotatedKey> {
        let current = self.ensure_current(user_id).await?;
        let old_version = current.record.key_version;
        let new_version = old_version.checked_add(1).ok_or_else(|| {
            VaultError::InvalidRecord(format!("key version overflow for user {user_id}"))
        })?;

        let old_key = current.record.data_key()?;
        let new_key = Self::generate_key()?;
        let record = self.new_record(user_id, &new_key, new_version, Utc::now());

        self.keys.archive(&current.record).await?;
        if !self
            .keys
            .swap_current(user_id, Some(&current.raw), &record)
            .await?
        {
            warn!("key rotation for user {user_id} lost a race at version {old_version}");
            return Err(VaultError::RotationConflict(user_id.to_string()));
        }
        info!("rotated key for user {user_id} to version {new_version}");

        self.prune_history(user_id).await?;

        Ok(RotatedKey {
            old_key,
            new_key,
            old_version,
            new_version,
        })
    }

    /// Whether the user's key is past its scheduled rotation. Unknown users
    /// are never due.
    pub async fn is_rotation_due(&self, user_id: &str) -> VaultResult<bool> {
        self.is_rotation_due_at(user_id, Utc::now()).await
    }

    pub async fn is_rotation_due_at(&self, user_id: &str, now: DateTime<Utc>) -> VaultResult<bool> {
        Ok(self
            .keys
            .load_current(user_id)
            .await?
            .is_some_and(|c| c.record.is_rotation_due(now)))
    }

    /// Resolves the key for an exact version, current or archived.
    pub async fn key_for_version(&self, user_id: &str, version: u32) -> VaultResult<DataKey> {
        if let Some(current) = self.keys.load_current(user_id).await? {
            if current.record.key_version == version {
                return current.record.data_key();
            }
        }

        match self.keys.load_version(user_id, version).await? {
            Some(record) => record.data_key(),
            None => Err(VaultError::KeyNotFound {
                user_id: user_id.to_string(),
                version,
            }),
        }
    }

    /// Drops the oldest archived versions beyond `max_retained_versions`.
    ///
    /// Returns the versions removed.
    pub async fn prune_history(&self, user_id: &str) -> VaultResult<Vec<u32>> {
        let Some(max) = self.policy.max_retained_versions else {
            return Ok(Vec::new());
        };

        let versions = self.keys.archived_versions(user_id).await?;
        let excess = versions.len().saturating_sub(max as usize);
        let mut removed = Vec::with_capacity(excess);
        for &version in &versions[..excess] {
            if self.keys.remove_version(user_id, version).await? {
                warn!(
                    "pruned key version {version} for user {user_id}; data sealed under it is no longer decryptable"
                );
                removed.push(version);
            }
        }
        Ok(removed)
    }
}
