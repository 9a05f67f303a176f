//! Audit trail for Haven.
//!
//! Provides:
//! - Deterministic risk and compliance classification of user actions
//! - Append-only event persistence with a bounded retry queue
//! - Filtered, paginated queries over the log
//! - Threshold-based suspicious activity detection
//! - Reproducible compliance reports with optional archival
//! - Retention sweeps driven by a background engine

pub mod classify;
pub mod config;
pub mod detector;
pub mod error;
pub mod log;
pub mod query;
pub mod recorder;
pub mod report;
pub mod retention;
pub mod types;

pub use classify::{Classification, classify};
pub use config::{AuditConfig, DetectorConfig, RetentionConfig};
pub use detector::{Alert, AlertType, SuspiciousActivityDetector};
pub use error::{AuditError, AuditResult};
pub use log::AuditLog;
pub use query::{AuditPage, AuditQuery};
pub use recorder::AuditRecorder;
pub use report::{
    ComplianceMetrics, ComplianceReport, ComplianceReporter, ReportPeriod, ReportType, Violation,
    build_report,
};
pub use retention::{
    JanitorCommand, JanitorEngine, JanitorHandle, RetentionJanitor, SweepReport,
    create_janitor_engine,
};
pub use types::{AuditContext, AuditEvent, ComplianceFlag, RiskLevel};
