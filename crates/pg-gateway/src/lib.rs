//! # pg-gateway
//!
//! The PolicyGuard service surface.
//!
//! [`Guardian`] implements the six PolicyGuard operations over a
//! [`GuardConfig`]-selected data directory: validate an action, register an
//! agent, create a policy, report an incident, query the audit log, and
//! produce a compliance report. [`PolicyGuardServer`] exposes the same
//! operations as MCP tools over `rmcp`.
//!
//! All tool input arrives as loosely typed strings (JSON text for lists and
//! objects); the Guardian parses it once and hands typed values to
//! `pg-policy` and `pg-audit`.

pub mod bundle;
pub mod config;
pub mod error;
pub mod guardian;
pub mod server;

pub use bundle::{load_policy_bundle, parse_policy_bundle};
pub use config::{GuardConfig, CONFIG_FILE, DEFAULT_SYSTEM_ACTOR};
pub use error::GatewayError;
pub use guardian::{
    AuditLogParams, ComplianceParams, CreatePolicyParams, CreatePolicyResponse, Guardian,
    RegisterAgentParams, RegisterAgentResponse, ReportIncidentParams, ReportIncidentResponse,
    ValidateActionParams, ValidateActionResponse,
};
pub use server::PolicyGuardServer;
