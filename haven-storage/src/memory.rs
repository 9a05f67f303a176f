//! In-memory store for tests and ephemeral sessions.

use crate::error::StorageResult;
use crate::KeyValueStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered in-memory map. Clones share the same underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool> {
        let mut entries = self.entries.write().await;
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), new);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_segment;

    #[test]
    fn key_segment_escapes_separator() {
        assert_eq!(key_segment("u1"), "u1");
        assert_eq!(key_segment("a:b"), "a%3Ab");
        assert_eq!(key_segment("50%:x"), "50%25%3Ax");
    }

    #[tokio::test]
    async fn escaped_users_do_not_collide_on_scan() {
        let store = MemoryStore::new();
        store
            .set(&format!("audit:{}:1", key_segment("u1")), b"a".to_vec())
            .await
            .unwrap();
        store
            .set(&format!("audit:{}:1", key_segment("u1:1")), b"b".to_vec())
            .await
            .unwrap();

        let hits = store
            .scan_prefix(&format!("audit:{}:", key_segment("u1")))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
