//! Deterministic risk and compliance classification.
//!
//! The rule table is evaluated top to bottom and the first matching risk
//! level wins. Compliance flags are independent of each other and of the
//! risk level. All matching is case-sensitive substring matching on the raw
//! action and resource names.

use crate::types::{ComplianceFlag, RiskLevel};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Result of classifying one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub risk_level: RiskLevel,
    pub compliance_flags: BTreeSet<ComplianceFlag>,
}

/// Classifies an action. Pure: identical inputs always yield identical output.
pub fn classify(action: &str, resource: &str, details: &Map<String, Value>) -> Classification {
    Classification {
        risk_level: risk_level(action, resource, details),
        compliance_flags: compliance_flags(action, resource),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn risk_level(action: &str, resource: &str, details: &Map<String, Value>) -> RiskLevel {
    if (action.contains("delete") && resource == "user_data")
        || contains_any(action, &["admin", "privilege"])
    {
        return RiskLevel::Critical;
    }

    if contains_any(action, &["export", "download"])
        || (resource.contains("health_data") && action.contains("access"))
        || action == "login_failed"
    {
        return RiskLevel::High;
    }

    let consent_denied = details.get("granted") == Some(&Value::Bool(false));
    if (action.contains("update") && resource.contains("privacy"))
        || (action.contains("consent") && consent_denied)
    {
        return RiskLevel::Medium;
    }

    RiskLevel::Low
}

fn compliance_flags(action: &str, resource: &str) -> BTreeSet<ComplianceFlag> {
    let mut flags = BTreeSet::new();

    if contains_any(resource, &["health", "medical"]) {
        flags.insert(ComplianceFlag::HipaaRelevant);
    }
    if contains_any(action, &["consent", "privacy", "export", "delete"]) {
        flags.insert(ComplianceFlag::GdprRelevant);
    }
    if contains_any(action, &["failed", "error", "unauthorized"]) {
        flags.insert(ComplianceFlag::SecurityIncident);
    }
    if contains_any(action, &["admin", "privilege"]) {
        flags.insert(ComplianceFlag::PrivilegedAccess);
    }

    flags
}
