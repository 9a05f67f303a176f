//! Builds, classifies and persists audit events.
//!
//! A failed write never fails the business action being audited. The event
//! is moved to an in-memory retry queue and written on the next
//! [`AuditRecorder::flush_pending`] (the janitor engine calls it on every
//! sweep). If the queue itself overflows, the evicted event is emitted in full
//! at `error!` level so it still reaches the operator's log sink.

use crate::config::AuditConfig;
use crate::error::{AuditError, AuditResult};
use crate::log::AuditLog;
use crate::types::{AuditContext, AuditEvent, RiskLevel};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

pub struct AuditRecorder {
    log: AuditLog,
    config: AuditConfig,
    pending: Mutex<VecDeque<AuditEvent>>,
}

impl AuditRecorder {
    pub fn new(log: AuditLog, config: AuditConfig) -> Self {
        Self {
            log,
            config,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn log(&self) -> &AuditLog {
        &self.log
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Records a user-facing action.
    ///
    /// Always returns the classified event. Persistence failures are queued
    /// for retry and logged rather than returned.
    pub async fn log_event(
        &self,
        ctx: &AuditContext,
        action: &str,
        resource: &str,
        details: Option<Map<String, Value>>,
        resource_id: Option<&str>,
    ) -> AuditEvent {
        let event = AuditEvent::new(ctx, action, resource, details, resource_id);

        if event.risk_level >= RiskLevel::High {
            warn!(
                "{} audit event {} for user {}: {action} on {resource}",
                event.risk_level, event.id, event.user_id
            );
        }

        if let Err(e) = self.record(event.clone()).await {
            error!("audit event {} queued for retry: {e}", event.id);
        }
        event
    }

    /// Persists a prebuilt event.
    ///
    /// On failure the event is queued and [`AuditError::Write`] is returned.
    pub async fn record(&self, event: AuditEvent) -> AuditResult<()> {
        match self.log.append(&event).await {
            Ok(()) => {
                debug!("recorded audit event {} ({})", event.id, event.action);
                Ok(())
            }
            Err(e) => {
                let msg = e.to_string();
                self.enqueue(event).await;
                Err(AuditError::Write(msg))
            }
        }
    }

    async fn enqueue(&self, event: AuditEvent) {
        let mut pending = self.pending.lock().await;
        if pending.len() >= self.config.retry_queue_capacity {
            if let Some(evicted) = pending.pop_front() {
                let json = serde_json::to_string(&evicted).unwrap_or_default();
                error!("audit retry queue full, evicting event: {json}");
            }
        }
        pending.push_back(event);
    }

    /// Retries every queued write.
    ///
    /// Returns the number of events written. If any still fail they stay
    /// queued and [`AuditError::Write`] is returned.
    pub async fn flush_pending(&self) -> AuditResult<usize> {
        let batch: Vec<AuditEvent> = {
            let mut pending = self.pending.lock().await;
            pending.drain(..).collect()
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        let mut failed = Vec::new();
        let mut last_error = None;
        for event in batch {
            match self.log.append(&event).await {
                Ok(()) => written += 1,
                Err(e) => {
                    last_error = Some(e.to_string());
                    failed.push(event);
                }
            }
        }

        if failed.is_empty() {
            debug!("flushed {written} queued audit events");
            return Ok(written);
        }

        let remaining = failed.len();
        {
            let mut pending = self.pending.lock().await;
            // Failed events go back ahead of anything queued meanwhile.
            for event in failed.into_iter().rev() {
                pending.push_front(event);
            }
        }
        Err(AuditError::Write(format!(
            "{remaining} events still pending after flushing {written}: {}",
            last_error.unwrap_or_default()
        )))
    }

    /// Number of events waiting for a retry.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
