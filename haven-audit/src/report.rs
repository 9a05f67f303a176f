//! Compliance reports derived from the audit log.
//!
//! A report is a pure function of the events in its period: the id is a
//! UUID v5 over (user, type, period) and `generated_at` is the period end,
//! so regenerating over an unchanged log yields an identical report.
//! Archived copies are history only, never a source of truth.

use crate::error::AuditResult;
use crate::log::AuditLog;
use crate::types::{AuditEvent, ComplianceFlag, RiskLevel};
use chrono::{DateTime, Utc};
use haven_storage::key_segment;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

const REPORT_PREFIX: &str = "report:";

/// Namespace for deterministic report ids.
const REPORT_NAMESPACE: Uuid = Uuid::from_u128(0x5d8f_2c3e_9a41_4b7e_8f60_1c2d_3e4f_5a6b);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Hipaa,
    Gdpr,
    Security,
    Full,
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Hipaa => write!(f, "hipaa"),
            ReportType::Gdpr => write!(f, "gdpr"),
            ReportType::Security => write!(f, "security"),
            ReportType::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceMetrics {
    pub data_accesses: usize,
    pub data_modifications: usize,
    pub consent_changes: usize,
    pub privacy_violations: usize,
    pub security_incidents: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub violation_type: String,
    pub severity: RiskLevel,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub id: Uuid,
    pub user_id: String,
    pub report_type: ReportType,
    pub generated_at: DateTime<Utc>,
    pub period: ReportPeriod,
    pub metrics: ComplianceMetrics,
    pub violations: Vec<Violation>,
}

impl ComplianceReport {
    pub fn to_json(&self) -> AuditResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct ComplianceReporter {
    log: AuditLog,
}

impl ComplianceReporter {
    pub fn new(log: AuditLog) -> Self {
        Self { log }
    }

    /// Computes a report over events with `start <= timestamp <= end`.
    pub async fn generate(
        &self,
        user_id: &str,
        report_type: ReportType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<ComplianceReport> {
        let events = self.log.events_between(user_id, start, end).await?;
        Ok(build_report(user_id, report_type, start, end, &events))
    }

    /// Persists a copy of the report for later retrieval.
    pub async fn archive(&self, report: &ComplianceReport) -> AuditResult<()> {
        let key = format!(
            "{REPORT_PREFIX}{}:{:020}:{}",
            key_segment(&report.user_id),
            Utc::now().timestamp_millis().max(0),
            report.id
        );
        self.log
            .store()
            .set(&key, serde_json::to_vec(report)?)
            .await?;
        info!(
            "archived {} compliance report {} for user {}",
            report.report_type, report.id, report.user_id
        );
        Ok(())
    }

    /// Archived reports for a user, oldest archive first.
    pub async fn history(&self, user_id: &str) -> AuditResult<Vec<ComplianceReport>> {
        let prefix = format!("{REPORT_PREFIX}{}:", key_segment(user_id));
        let entries = self.log.store().scan_prefix(&prefix).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, bytes)| match serde_json::from_slice(&bytes) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("skipping unreadable report {key}: {e}");
                    None
                }
            })
            .collect())
    }
}

/// Pure report construction over an already-filtered event set.
pub fn build_report(
    user_id: &str,
    report_type: ReportType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    events: &[AuditEvent],
) -> ComplianceReport {
    let mut events: Vec<&AuditEvent> = events.iter().collect();
    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let count = |pred: &dyn Fn(&AuditEvent) -> bool| events.iter().filter(|&&e| pred(e)).count();

    let metrics = ComplianceMetrics {
        data_accesses: count(&|e| e.action.contains("read") || e.action.contains("view")),
        data_modifications: count(&|e| {
            ["create", "update", "delete"]
                .iter()
                .any(|verb| e.action.contains(verb))
        }),
        consent_changes: count(&|e| e.resource == "consent"),
        privacy_violations: count(&|e| e.risk_level.is_elevated()),
        security_incidents: count(&|e| e.has_flag(ComplianceFlag::SecurityIncident)),
    };

    let violations = events
        .iter()
        .filter(|e| e.risk_level.is_elevated())
        .map(|e| Violation {
            violation_type: violation_type(e).to_string(),
            severity: e.risk_level,
            description: format!("{} on {}", e.action, e.resource),
            timestamp: e.timestamp,
            resolved: false,
        })
        .collect();

    let id_name = format!(
        "{user_id}|{report_type}|{}|{}",
        start.timestamp_millis(),
        end.timestamp_millis()
    );

    ComplianceReport {
        id: Uuid::new_v5(&REPORT_NAMESPACE, id_name.as_bytes()),
        user_id: user_id.to_string(),
        report_type,
        generated_at: end,
        period: ReportPeriod { start, end },
        metrics,
        violations,
    }
}

fn violation_type(event: &AuditEvent) -> &'static str {
    if event.has_flag(ComplianceFlag::SecurityIncident) {
        "security_incident"
    } else if event.has_flag(ComplianceFlag::PrivilegedAccess) {
        "privileged_access"
    } else if event.has_flag(ComplianceFlag::HipaaRelevant) {
        "health_data_exposure"
    } else {
        "high_risk_action"
    }
}
