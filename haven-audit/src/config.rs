//! Audit, detection and retention configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the audit recorder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum events held in memory while the store is failing.
    pub retry_queue_capacity: usize,

    /// Page size used when a query doesn't specify one.
    pub default_page_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retry_queue_capacity: 10_000,
            default_page_size: 50,
        }
    }
}

/// Thresholds for the suspicious-activity heuristics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Length of the look-back window in hours.
    pub window_hours: i64,

    /// Alert when more than this many "access" events occur in the window.
    pub excessive_access_threshold: usize,

    /// Alert when more than this many `login_failed` events occur in the window.
    pub brute_force_threshold: usize,

    /// Updates before this local hour count as off-hours.
    pub off_hours_before: u32,

    /// Updates after this local hour count as off-hours.
    pub off_hours_after: u32,

    /// Offset from UTC, in minutes, used to compute the local hour.
    pub utc_offset_minutes: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            excessive_access_threshold: 100,
            brute_force_threshold: 5,
            off_hours_before: 6,
            off_hours_after: 22,
            utc_offset_minutes: 0,
        }
    }
}

/// Audit log retention policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Events older than this many days are purged (7 years).
    pub retention_days: i64,

    /// Interval between background sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: 7 * 365 + 2,
            sweep_interval_secs: 24 * 60 * 60,
        }
    }
}
