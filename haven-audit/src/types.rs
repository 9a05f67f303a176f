//! Audit event model.

use crate::classify::classify;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Coarse severity attached to every audit event.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// High and critical events count as violations in compliance reports.
    pub fn is_elevated(self) -> bool {
        self >= RiskLevel::High
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Regulatory or security tag on an event. Any subset may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceFlag {
    HipaaRelevant,
    GdprRelevant,
    SecurityIncident,
    PrivilegedAccess,
}

impl fmt::Display for ComplianceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceFlag::HipaaRelevant => write!(f, "hipaa_relevant"),
            ComplianceFlag::GdprRelevant => write!(f, "gdpr_relevant"),
            ComplianceFlag::SecurityIncident => write!(f, "security_incident"),
            ComplianceFlag::PrivilegedAccess => write!(f, "privileged_access"),
        }
    }
}

/// Who is acting, threaded explicitly through every audited call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContext {
    pub user_id: String,
    pub session_id: String,
}

impl AuditContext {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// A single classified audit record.
///
/// Events are append-only: once persisted they are never modified, and only
/// the retention sweep removes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: String,
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub compliance_flags: BTreeSet<ComplianceFlag>,
}

impl AuditEvent {
    /// Builds and classifies an event stamped with the current time.
    pub fn new(
        ctx: &AuditContext,
        action: &str,
        resource: &str,
        details: Option<Map<String, Value>>,
        resource_id: Option<&str>,
    ) -> Self {
        let details = details.unwrap_or_default();
        let classification = classify(action, resource, &details);

        Self {
            id: Uuid::now_v7(),
            user_id: ctx.user_id.clone(),
            action: action.to_string(),
            resource: resource.to_string(),
            resource_id: resource_id.map(str::to_string),
            timestamp: Utc::now(),
            session_id: ctx.session_id.clone(),
            details,
            risk_level: classification.risk_level,
            compliance_flags: classification.compliance_flags,
        }
    }

    /// Overrides the timestamp before the event is persisted (imports, replays).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_flag(&self, flag: ComplianceFlag) -> bool {
        self.compliance_flags.contains(&flag)
    }
}
