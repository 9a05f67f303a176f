//! Filtered, paginated reads over the audit log.

use crate::error::AuditResult;
use crate::log::AuditLog;
use crate::types::{AuditEvent, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filter for audit log reads. All filters are conjunctive; `None` matches
/// everything. Results are most-recent-first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditQuery {
    pub user_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub risk_level: Option<RiskLevel>,
    pub action_contains: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = Some(level);
        self
    }

    pub fn action_contains(mut self, needle: impl Into<String>) -> Self {
        self.action_contains = Some(needle.into());
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        self.start.is_none_or(|s| event.timestamp >= s)
            && self.end.is_none_or(|e| event.timestamp <= e)
            && self.risk_level.is_none_or(|r| event.risk_level == r)
            && self
                .action_contains
                .as_deref()
                .is_none_or(|needle| event.action.contains(needle))
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    /// Number of matching events before pagination.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl AuditPage {
    pub fn has_more(&self) -> bool {
        self.offset + self.events.len() < self.total
    }
}

impl AuditLog {
    /// Runs a query. `default_limit` applies when the query has no limit.
    pub async fn query(&self, query: &AuditQuery, default_limit: usize) -> AuditResult<AuditPage> {
        let mut events = match &query.user_id {
            Some(user_id) => self.events_for_user(user_id).await?,
            None => self.scan_all().await?.into_iter().map(|(_, e)| e).collect(),
        };

        events.retain(|e| query.matches(e));
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));

        let total = events.len();
        let limit = query.limit.unwrap_or(default_limit);
        let events = events.into_iter().skip(query.offset).take(limit).collect();

        Ok(AuditPage {
            events,
            total,
            offset: query.offset,
            limit,
        })
    }
}
