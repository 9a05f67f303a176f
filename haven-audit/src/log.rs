//! Storage layout for audit events.
//!
//! Each event is written under its own key
//! `audit:{user}:{timestamp_ms:020}:{event_id}`, so appends never overwrite
//! each other and a prefix scan per user returns events in chronological
//! order.

use crate::error::AuditResult;
use crate::types::AuditEvent;
use chrono::{DateTime, Utc};
use haven_storage::{KeyValueStore, key_segment};
use std::sync::Arc;
use tracing::warn;

const AUDIT_PREFIX: &str = "audit:";

/// Read/append access to persisted audit events.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn KeyValueStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Storage key for an event.
    pub fn event_key(event: &AuditEvent) -> String {
        let millis = event.timestamp.timestamp_millis().max(0);
        format!(
            "{AUDIT_PREFIX}{}:{millis:020}:{}",
            key_segment(&event.user_id),
            event.id
        )
    }

    fn user_prefix(user_id: &str) -> String {
        format!("{AUDIT_PREFIX}{}:", key_segment(user_id))
    }

    /// Appends one event.
    pub async fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        let bytes = serde_json::to_vec(event)?;
        self.store.set(&Self::event_key(event), bytes).await?;
        Ok(())
    }

    /// All events for a user, oldest first.
    pub async fn events_for_user(&self, user_id: &str) -> AuditResult<Vec<AuditEvent>> {
        let entries = self.store.scan_prefix(&Self::user_prefix(user_id)).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, bytes)| decode(&key, &bytes))
            .collect())
    }

    /// Events for a user with `start <= timestamp <= end`, oldest first.
    pub async fn events_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<Vec<AuditEvent>> {
        let mut events = self.events_for_user(user_id).await?;
        events.retain(|e| e.timestamp >= start && e.timestamp <= end);
        Ok(events)
    }

    /// Every event in the store paired with its key, across all users.
    pub async fn scan_all(&self) -> AuditResult<Vec<(String, AuditEvent)>> {
        let entries = self.store.scan_prefix(AUDIT_PREFIX).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, bytes)| decode(&key, &bytes).map(|e| (key, e)))
            .collect())
    }

    /// Removes one event by key. Only the retention sweep calls this.
    pub(crate) async fn remove(&self, key: &str) -> AuditResult<bool> {
        Ok(self.store.delete(key).await?)
    }
}

fn decode(key: &str, bytes: &[u8]) -> Option<AuditEvent> {
    match serde_json::from_slice(bytes) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("skipping unreadable audit entry {key}: {e}");
            None
        }
    }
}
