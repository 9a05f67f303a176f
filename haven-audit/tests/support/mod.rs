//! Shared fixtures for audit integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use haven_audit::{AuditConfig, AuditContext, AuditEvent, AuditLog, AuditRecorder};
use haven_storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory store whose writes can be switched off to simulate an outage.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool> {
        self.check()?;
        self.inner.compare_and_swap(key, expected, new).await
    }
}

pub fn memory_log() -> AuditLog {
    AuditLog::new(Arc::new(MemoryStore::new()))
}

pub fn recorder(log: &AuditLog) -> AuditRecorder {
    AuditRecorder::new(log.clone(), AuditConfig::default())
}

pub fn ctx(user_id: &str) -> AuditContext {
    AuditContext::new(user_id, "session-1")
}

/// A fixed reference instant (a Tuesday, midday UTC).
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

pub fn event_at(user_id: &str, action: &str, resource: &str, at: DateTime<Utc>) -> AuditEvent {
    AuditEvent::new(&ctx(user_id), action, resource, None, None).at(at)
}

pub fn event_with(
    user_id: &str,
    action: &str,
    resource: &str,
    details: Value,
    at: DateTime<Utc>,
) -> AuditEvent {
    let details: Map<String, Value> = details.as_object().cloned().unwrap_or_default();
    AuditEvent::new(&ctx(user_id), action, resource, Some(details), None).at(at)
}

pub async fn seed(log: &AuditLog, events: impl IntoIterator<Item = AuditEvent>) {
    for event in events {
        log.append(&event).await.unwrap();
    }
}
