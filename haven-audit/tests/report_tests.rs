//! Compliance report generation, idempotence and archival.

mod support;

use chrono::Duration;
use haven_audit::{
    ComplianceMetrics, ComplianceReporter, ReportType, RiskLevel, Violation,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{event_at, event_with, memory_log, noon, seed};

async fn seeded_reporter() -> ComplianceReporter {
    let log = memory_log();
    let t = noon();
    seed(
        &log,
        [
            event_at("alice", "view_record", "health_data", t + Duration::minutes(1)),
            event_at("alice", "update_settings", "privacy_settings", t + Duration::minutes(2)),
            event_with(
                "alice",
                "consent_update",
                "consent",
                json!({"granted": false}),
                t + Duration::minutes(3),
            ),
            event_at("alice", "login_failed", "auth", t + Duration::minutes(4)),
            event_at("alice", "delete_account", "user_data", t + Duration::minutes(5)),
            // Outside the reporting period.
            event_at("alice", "data_export", "user_data", t - Duration::days(2)),
            // Another user.
            event_at("bob", "admin_override", "settings", t + Duration::minutes(1)),
        ],
    )
    .await;
    ComplianceReporter::new(log)
}

#[tokio::test]
async fn metrics_count_events_in_period() {
    let reporter = seeded_reporter().await;
    let start = noon();
    let end = start + Duration::hours(1);

    let report = reporter
        .generate("alice", ReportType::Full, start, end)
        .await
        .unwrap();

    assert_eq!(
        report.metrics,
        ComplianceMetrics {
            data_accesses: 1,
            data_modifications: 3,
            consent_changes: 1,
            privacy_violations: 2,
            security_incidents: 1,
        }
    );
    assert_eq!(report.user_id, "alice");
    assert_eq!(report.generated_at, end);
    assert_eq!(report.period.start, start);
    assert_eq!(report.period.end, end);
}

#[tokio::test]
async fn violations_are_chronological_and_unresolved() {
    let reporter = seeded_reporter().await;
    let start = noon();

    let report = reporter
        .generate("alice", ReportType::Security, start, start + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(
        report.violations,
        vec![
            Violation {
                violation_type: "security_incident".to_string(),
                severity: RiskLevel::High,
                description: "login_failed on auth".to_string(),
                timestamp: start + Duration::minutes(4),
                resolved: false,
            },
            Violation {
                violation_type: "high_risk_action".to_string(),
                severity: RiskLevel::Critical,
                description: "delete_account on user_data".to_string(),
                timestamp: start + Duration::minutes(5),
                resolved: false,
            },
        ]
    );
}

#[tokio::test]
async fn generation_is_idempotent() {
    let reporter = seeded_reporter().await;
    let start = noon() - Duration::days(7);
    let end = noon() + Duration::days(1);

    let first = reporter.generate("alice", ReportType::Hipaa, start, end).await.unwrap();
    let second = reporter.generate("alice", ReportType::Hipaa, start, end).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[tokio::test]
async fn report_id_depends_on_type_and_period() {
    let reporter = seeded_reporter().await;
    let start = noon();
    let end = start + Duration::hours(1);

    let hipaa = reporter.generate("alice", ReportType::Hipaa, start, end).await.unwrap();
    let gdpr = reporter.generate("alice", ReportType::Gdpr, start, end).await.unwrap();
    let wider = reporter
        .generate("alice", ReportType::Hipaa, start, end + Duration::hours(1))
        .await
        .unwrap();

    assert_ne!(hipaa.id, gdpr.id);
    assert_ne!(hipaa.id, wider.id);
}

#[tokio::test]
async fn period_bounds_are_inclusive() {
    let log = memory_log();
    let start = noon();
    let end = start + Duration::hours(1);
    seed(
        &log,
        [
            event_at("alice", "record_read", "notes", start),
            event_at("alice", "record_read", "notes", end),
            event_at("alice", "record_read", "notes", end + Duration::milliseconds(1)),
        ],
    )
    .await;

    let report = ComplianceReporter::new(log)
        .generate("alice", ReportType::Gdpr, start, end)
        .await
        .unwrap();

    assert_eq!(report.metrics.data_accesses, 2);
}

#[tokio::test]
async fn empty_period_yields_zero_report() {
    let reporter = seeded_reporter().await;
    let start = noon() + Duration::days(30);

    let report = reporter
        .generate("alice", ReportType::Full, start, start + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(report.metrics, ComplianceMetrics::default());
    assert!(report.violations.is_empty());
}

#[tokio::test]
async fn report_json_uses_camel_case() {
    let reporter = seeded_reporter().await;
    let start = noon();

    let report = reporter
        .generate("alice", ReportType::Gdpr, start, start + Duration::hours(1))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["reportType"], "gdpr");
    assert_eq!(json["metrics"]["privacyViolations"], 2);
    assert_eq!(json["violations"][0]["type"], "security_incident");
    assert_eq!(json["violations"][0]["resolved"], false);
}

#[tokio::test]
async fn archived_reports_appear_in_history() {
    let reporter = seeded_reporter().await;
    let start = noon();

    assert!(reporter.history("alice").await.unwrap().is_empty());

    let first = reporter
        .generate("alice", ReportType::Hipaa, start, start + Duration::hours(1))
        .await
        .unwrap();
    reporter.archive(&first).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = reporter
        .generate("alice", ReportType::Security, start, start + Duration::hours(2))
        .await
        .unwrap();
    reporter.archive(&second).await.unwrap();

    let history = reporter.history("alice").await.unwrap();
    assert_eq!(history, vec![first, second]);
    assert!(reporter.history("bob").await.unwrap().is_empty());
}
