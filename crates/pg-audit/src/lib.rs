//! # pg-audit
//!
//! Audit trail, incident log and compliance reporting for PolicyGuard.
//!
//! Every validated action is written to the audit log as an [`AuditEntry`];
//! anything that was not simply allowed also raises an [`Incident`]. Agents
//! and operators can report incidents directly, and a `critical` one
//! suspends the agent it names. [`query`] pages through the log and
//! [`ComplianceReport`] summarizes a time window.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pg_audit::{AuditRecorder, RetentionLimits};
//! use pg_store::MemoryStore;
//!
//! let recorder = AuditRecorder::new(Arc::new(MemoryStore::new()), RetentionLimits::default());
//! recorder
//!     .record_system_event(
//!         "guardian-system",
//!         "agent_registration",
//!         "agent-1",
//!         serde_json::json!({"trust_level": "low"}),
//!         "Agent registration completed",
//!         chrono::Utc::now(),
//!     )
//!     .unwrap();
//! ```

pub mod compliance;
pub mod entry;
pub mod error;
pub mod incident;
pub mod query;
pub mod recorder;

pub use compliance::{ComplianceReport, HealthStatus, ReportOptions};
pub use entry::{new_id, AuditEntry, AuditEvaluation, AuditedAction};
pub use error::AuditError;
pub use incident::{Incident, IncidentReport, IncidentType, Severity};
pub use query::{parse_time_range, query, AuditPage, AuditQuery, DEFAULT_LIMIT};
pub use recorder::{AuditRecorder, IncidentRecord, RetentionLimits};
