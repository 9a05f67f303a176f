//! Threshold heuristics over a user's recent audit events.

use crate::config::DetectorConfig;
use crate::error::AuditResult;
use crate::log::AuditLog;
use crate::types::{AuditEvent, RiskLevel};
use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ExcessiveAccess,
    BruteForce,
    OffHoursActivity,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::ExcessiveAccess => write!(f, "excessive_access"),
            AlertType::BruteForce => write!(f, "brute_force"),
            AlertType::OffHoursActivity => write!(f, "off_hours_activity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: RiskLevel,
    pub user_id: String,
    /// Number of events that tripped the rule.
    pub count: usize,
    pub description: String,
    pub detected_at: DateTime<Utc>,
}

pub struct SuspiciousActivityDetector {
    log: AuditLog,
    config: DetectorConfig,
}

impl SuspiciousActivityDetector {
    pub fn new(log: AuditLog, config: DetectorConfig) -> Self {
        Self { log, config }
    }

    /// Scans the configured window ending now.
    pub async fn detect(&self, user_id: &str) -> AuditResult<Vec<Alert>> {
        self.detect_at(user_id, Utc::now()).await
    }

    /// Scans the window `[now - window_hours, now]`.
    pub async fn detect_at(&self, user_id: &str, now: DateTime<Utc>) -> AuditResult<Vec<Alert>> {
        let start = Duration::try_hours(self.config.window_hours)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let events = self.log.events_between(user_id, start, now).await?;
        let alerts = self.evaluate(user_id, &events, now);

        for alert in &alerts {
            warn!(
                "suspicious activity for user {user_id}: {} ({} events)",
                alert.alert_type, alert.count
            );
        }
        Ok(alerts)
    }

    /// Applies every rule to an already-windowed event set.
    pub fn evaluate(&self, user_id: &str, events: &[AuditEvent], now: DateTime<Utc>) -> Vec<Alert> {
        let cfg = &self.config;
        let mut alerts = Vec::new();
        let mut push = |alert_type, severity, count, description: String| {
            alerts.push(Alert {
                alert_type,
                severity,
                user_id: user_id.to_string(),
                count,
                description,
                detected_at: now,
            });
        };

        let accesses = events.iter().filter(|e| e.action.contains("access")).count();
        if accesses > cfg.excessive_access_threshold {
            push(
                AlertType::ExcessiveAccess,
                RiskLevel::Medium,
                accesses,
                format!(
                    "{accesses} data access events in {}h (threshold {})",
                    cfg.window_hours, cfg.excessive_access_threshold
                ),
            );
        }

        let failed_logins = events.iter().filter(|e| e.action == "login_failed").count();
        if failed_logins > cfg.brute_force_threshold {
            push(
                AlertType::BruteForce,
                RiskLevel::High,
                failed_logins,
                format!(
                    "{failed_logins} failed logins in {}h (threshold {})",
                    cfg.window_hours, cfg.brute_force_threshold
                ),
            );
        }

        let offset = self.local_offset();
        let off_hours = events
            .iter()
            .filter(|e| e.action.contains("update"))
            .filter(|e| {
                let hour = e.timestamp.with_timezone(&offset).hour();
                hour < cfg.off_hours_before || hour > cfg.off_hours_after
            })
            .count();
        if off_hours > 0 {
            push(
                AlertType::OffHoursActivity,
                RiskLevel::Medium,
                off_hours,
                format!("{off_hours} updates outside working hours"),
            );
        }

        alerts
    }

    fn local_offset(&self) -> FixedOffset {
        let seconds = self.config.utc_offset_minutes.checked_mul(60);
        seconds.and_then(FixedOffset::east_opt).unwrap_or_else(|| {
            warn!(
                "invalid utc_offset_minutes {}, using UTC",
                self.config.utc_offset_minutes
            );
            Utc.fix()
        })
    }
}
