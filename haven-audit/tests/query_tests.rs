//! Filtered and paginated audit log reads.

mod support;

use chrono::Duration;
use haven_audit::{AuditConfig, AuditQuery, RiskLevel};
use support::{event_at, memory_log, noon, seed};

const DEFAULT_LIMIT: usize = 50;

#[tokio::test]
async fn results_are_most_recent_first_and_paged() {
    let log = memory_log();
    let t = noon();
    seed(
        &log,
        (0..10).map(|i| event_at("alice", &format!("view_{i}"), "notes", t + Duration::minutes(i))),
    )
    .await;

    let page = log
        .query(&AuditQuery::new().for_user("alice").page(0, 3), DEFAULT_LIMIT)
        .await
        .unwrap();
    let actions: Vec<_> = page.events.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["view_9", "view_8", "view_7"]);
    assert_eq!(page.total, 10);
    assert!(page.has_more());

    let last = log
        .query(&AuditQuery::new().for_user("alice").page(9, 3), DEFAULT_LIMIT)
        .await
        .unwrap();
    assert_eq!(last.events.len(), 1);
    assert_eq!(last.events[0].action, "view_0");
    assert!(!last.has_more());
}

#[tokio::test]
async fn default_limit_applies_without_explicit_page() {
    let log = memory_log();
    let t = noon();
    seed(
        &log,
        (0..60).map(|i| event_at("alice", "view", "notes", t + Duration::seconds(i))),
    )
    .await;

    let default_limit = AuditConfig::default().default_page_size;
    let page = log
        .query(&AuditQuery::new().for_user("alice"), default_limit)
        .await
        .unwrap();

    assert_eq!(page.limit, 50);
    assert_eq!(page.events.len(), 50);
    assert_eq!(page.total, 60);
}

#[tokio::test]
async fn filters_combine() {
    let log = memory_log();
    let t = noon();
    seed(
        &log,
        [
            event_at("alice", "login_failed", "auth", t),
            event_at("alice", "login_failed", "auth", t + Duration::hours(2)),
            event_at("alice", "data_export", "user_data", t + Duration::minutes(30)),
            event_at("alice", "view", "notes", t + Duration::minutes(45)),
            event_at("bob", "login_failed", "auth", t + Duration::minutes(10)),
        ],
    )
    .await;

    let high = log
        .query(
            &AuditQuery::new()
                .for_user("alice")
                .with_risk_level(RiskLevel::High)
                .between(t, t + Duration::hours(1)),
            DEFAULT_LIMIT,
        )
        .await
        .unwrap();
    assert_eq!(high.total, 2);
    assert_eq!(high.events[0].action, "data_export");
    assert_eq!(high.events[1].action, "login_failed");

    let failures = log
        .query(&AuditQuery::new().action_contains("failed"), DEFAULT_LIMIT)
        .await
        .unwrap();
    assert_eq!(failures.total, 3);
    assert!(failures.events.iter().any(|e| e.user_id == "bob"));
}

#[tokio::test]
async fn unknown_user_yields_empty_page() {
    let log = memory_log();
    let page = log
        .query(&AuditQuery::new().for_user("nobody"), DEFAULT_LIMIT)
        .await
        .unwrap();

    assert!(page.events.is_empty());
    assert_eq!(page.total, 0);
    assert!(!page.has_more());
}

#[test]
fn query_deserializes_with_defaults() {
    let query: AuditQuery =
        serde_json::from_str(r#"{"userId": "alice", "riskLevel": "critical"}"#).unwrap();

    assert_eq!(query.user_id.as_deref(), Some("alice"));
    assert_eq!(query.risk_level, Some(RiskLevel::Critical));
    assert_eq!(query.offset, 0);
    assert_eq!(query.limit, None);
}
