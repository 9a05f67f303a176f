//! Key policy and the aggregate Haven configuration.

use crate::error::{VaultError, VaultResult};
use chrono::Duration;
use haven_audit::{AuditConfig, DetectorConfig, RetentionConfig};
use serde::{Deserialize, Serialize};

/// Per-user key lifecycle policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPolicy {
    /// Days between scheduled rotations.
    pub rotation_interval_days: i64,

    /// Archived key versions to keep per user. `None` keeps every version.
    ///
    /// Data still encrypted under a pruned version can no longer be
    /// decrypted, so only bound this after running a key migration.
    pub max_retained_versions: Option<u32>,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            rotation_interval_days: 90,
            max_retained_versions: None,
        }
    }
}

/// Top-level configuration for every Haven service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HavenConfig {
    pub keys: KeyPolicy,
    pub audit: AuditConfig,
    pub detector: DetectorConfig,
    pub retention: RetentionConfig,
}

impl HavenConfig {
    /// Parses a JSON config document. Missing sections and fields take their
    /// defaults.
    pub fn from_json_str(json: &str) -> VaultResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that fall outside what the services can represent.
    pub fn validate(&self) -> VaultResult<()> {
        let invalid = |msg: String| Err(VaultError::InvalidConfig(msg));

        let rotation = self.keys.rotation_interval_days;
        if rotation <= 0 || Duration::try_days(rotation).is_none() {
            return invalid(format!("keys.rotation_interval_days out of range: {rotation}"));
        }

        let window = self.detector.window_hours;
        if window <= 0 || Duration::try_hours(window).is_none() {
            return invalid(format!("detector.window_hours out of range: {window}"));
        }

        let offset = self.detector.utc_offset_minutes;
        if offset.unsigned_abs() >= 24 * 60 {
            return invalid(format!("detector.utc_offset_minutes out of range: {offset}"));
        }

        let (before, after) = (self.detector.off_hours_before, self.detector.off_hours_after);
        if before > 23 || after > 23 {
            return invalid(format!("detector off-hours bounds out of range: {before}..{after}"));
        }

        let retention = self.retention.retention_days;
        if retention < 0 || Duration::try_days(retention).is_none() {
            return invalid(format!("retention.retention_days out of range: {retention}"));
        }

        Ok(())
    }
}
