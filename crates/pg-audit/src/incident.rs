// incident.rs — Security incident data model.
//
// Incidents come from two places: every non-allowed decision produces a
// `policy_violation` incident, and agents or operators report incidents
// directly. Type and severity are fixed enums on the wire; unknown strings
// coerce to `other` and `medium` rather than being rejected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a security incident.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum IncidentType {
    PolicyViolation,
    SuspiciousActivity,
    UnauthorizedAccess,
    RateLimitExceeded,
    DataExfiltration,
    ConfigurationError,
    #[default]
    Other,
}

impl IncidentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentType::PolicyViolation => "policy_violation",
            IncidentType::SuspiciousActivity => "suspicious_activity",
            IncidentType::UnauthorizedAccess => "unauthorized_access",
            IncidentType::RateLimitExceeded => "rate_limit_exceeded",
            IncidentType::DataExfiltration => "data_exfiltration",
            IncidentType::ConfigurationError => "configuration_error",
            IncidentType::Other => "other",
        }
    }
}

impl From<String> for IncidentType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&str> for IncidentType {
    fn from(s: &str) -> Self {
        match s {
            "policy_violation" => IncidentType::PolicyViolation,
            "suspicious_activity" => IncidentType::SuspiciousActivity,
            "unauthorized_access" => IncidentType::UnauthorizedAccess,
            "rate_limit_exceeded" => IncidentType::RateLimitExceeded,
            "data_exfiltration" => IncidentType::DataExfiltration,
            "configuration_error" => IncidentType::ConfigurationError,
            _ => IncidentType::Other,
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious an incident is. `Critical` suspends the agent involved.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        match s {
            "low" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub incident_type: IncidentType,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, alias = "details")]
    pub description: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Set when the incident was raised by a decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default = "empty_object")]
    pub evidence: serde_json::Value,
    #[serde(default)]
    pub recommended_action: String,
    #[serde(default = "open_status")]
    pub status: String,
    /// Free-form: a note, or a structured record of how it was resolved.
    #[serde(default)]
    pub resolution: Option<serde_json::Value>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

fn open_status() -> String {
    "open".to_string()
}

/// A caller-reported incident, before an id and timestamp are assigned.
#[derive(Debug, Clone, Default)]
pub struct IncidentReport {
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    /// Empty or `None` means no agent is implicated.
    pub agent_id: Option<String>,
    pub evidence: serde_json::Value,
    pub recommended_action: String,
}

impl IncidentReport {
    pub(crate) fn into_incident(self, incident_id: String, now: DateTime<Utc>) -> Incident {
        let evidence = if self.evidence.is_null() {
            empty_object()
        } else {
            self.evidence
        };
        Incident {
            incident_id,
            timestamp: now,
            incident_type: self.incident_type,
            severity: self.severity,
            description: self.description,
            agent_id: self.agent_id.filter(|id| !id.is_empty()),
            action_id: None,
            evidence,
            recommended_action: self.recommended_action,
            status: open_status(),
            resolution: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_and_severity_coerce() {
        assert_eq!(IncidentType::from("prompt_injection"), IncidentType::Other);
        assert_eq!(Severity::from("catastrophic"), Severity::Medium);
        assert_eq!(IncidentType::from("data_exfiltration"), IncidentType::DataExfiltration);
        assert_eq!(Severity::from("critical"), Severity::Critical);
    }

    #[test]
    fn decision_incidents_with_details_key_parse() {
        let incident: Incident = serde_json::from_value(serde_json::json!({
            "incident_id": "inc_1",
            "timestamp": "2026-01-01T00:00:00Z",
            "type": "policy_violation",
            "severity": "medium",
            "agent_id": "a",
            "action_id": "act_1",
            "details": "Agent 'a' attempted 'tool_call' on 'x' - DENIED: no"
        }))
        .unwrap();
        assert_eq!(incident.incident_type, IncidentType::PolicyViolation);
        assert!(incident.description.starts_with("Agent 'a'"));
        assert_eq!(incident.status, "open");
        assert!(incident.evidence.is_object());
    }

    #[test]
    fn structured_resolution_parses() {
        let incident: Incident = serde_json::from_value(serde_json::json!({
            "incident_id": "inc_2",
            "timestamp": "2026-01-01T00:00:00Z",
            "type": "suspicious_activity",
            "status": "resolved",
            "resolution": {"by": "oncall", "action": "credentials rotated"}
        }))
        .unwrap();
        assert_eq!(incident.status, "resolved");
        assert_eq!(incident.resolution.unwrap()["by"], "oncall");

        let incident: Incident = serde_json::from_value(serde_json::json!({
            "incident_id": "inc_3",
            "timestamp": "2026-01-01T00:00:00Z",
            "resolution": "false positive"
        }))
        .unwrap();
        assert_eq!(incident.resolution, Some(serde_json::json!("false positive")));
    }

    #[test]
    fn report_drops_empty_agent_id() {
        let incident = IncidentReport {
            agent_id: Some(String::new()),
            ..Default::default()
        }
        .into_incident("inc_x".to_string(), Utc::now());
        assert!(incident.agent_id.is_none());
        assert_eq!(incident.evidence, serde_json::json!({}));
    }
}
