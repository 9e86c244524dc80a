// entry.rs — Audit entry data model.
//
// One entry per decision or administrative operation. Entries are written
// once and never edited; the collection is an array, oldest first, trimmed
// from the front when it exceeds its cap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pg_policy::{ActionRequest, Decision};

/// Generate a `<prefix>_<12 hex>` identifier (`act_`, `aud_`, `inc_`).
pub fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..12])
}

/// The action an entry describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditedAction {
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

/// What was decided about the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvaluation {
    /// Missing in hand-written records; treated as allowed.
    #[serde(default = "default_allowed")]
    pub allowed: bool,
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default)]
    pub reason: String,
}

fn default_allowed() -> bool {
    true
}

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    /// Correlates decision entries with incidents. Absent for admin entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub agent_id: String,
    pub action: AuditedAction,
    pub evaluation: AuditEvaluation,
}

impl AuditEntry {
    /// The entry recorded for a validated action.
    pub fn for_decision(
        request: &ActionRequest,
        action_id: &str,
        decision: &Decision,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: new_id("aud"),
            action_id: Some(action_id.to_string()),
            timestamp: now,
            agent_id: request.agent_id.clone(),
            action: AuditedAction {
                action_type: request.action_type.clone(),
                target: request.target.clone(),
                parameters: request.parameters.clone(),
                context: request.context.clone(),
            },
            evaluation: AuditEvaluation {
                allowed: decision.allowed,
                require_approval: decision.require_approval,
                reason: decision.reason.clone(),
            },
        }
    }

    /// An administrative entry attributed to `actor` (always allowed).
    pub fn system(
        actor: &str,
        kind: &str,
        target: &str,
        parameters: serde_json::Value,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: new_id("aud"),
            action_id: None,
            timestamp: now,
            agent_id: actor.to_string(),
            action: AuditedAction {
                action_type: kind.to_string(),
                target: target.to_string(),
                parameters,
                context: String::new(),
            },
            evaluation: AuditEvaluation {
                allowed: true,
                require_approval: false,
                reason: reason.to_string(),
            },
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.evaluation.allowed
    }
}
