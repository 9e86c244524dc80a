// recorder.rs — Writes audit entries and incidents.
//
// The recorder is the only writer of the `audit_log` and `incidents`
// collections. Both are bounded arrays; `CollectionStore::append` drops the
// oldest items once a cap is reached.
//
// Reading is tolerant: individual stored records that no longer parse are
// skipped with a warning so one bad line cannot hide the rest of the log.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use pg_policy::{ActionRequest, AgentDirectory, Decision};
use pg_store::{Collection, SharedStore};

use crate::entry::{new_id, AuditEntry};
use crate::error::AuditError;
use crate::incident::{Incident, IncidentReport, IncidentType, Severity};

/// Retention caps for the append-only collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionLimits {
    pub max_audit_entries: usize,
    pub max_incidents: usize,
}

impl Default for RetentionLimits {
    fn default() -> Self {
        Self {
            max_audit_entries: 1000,
            max_incidents: 1000,
        }
    }
}

/// Result of `AuditRecorder::record_incident`.
#[derive(Debug, Clone)]
pub struct IncidentRecord {
    pub incident: Incident,
    /// True when a critical incident suspended a known agent.
    pub agent_suspended: bool,
    /// Set when the incident was stored but the suspension it called for
    /// could not be written.
    pub suspension_error: Option<String>,
}

/// Appends audit entries and incidents, and applies incident side effects.
#[derive(Clone)]
pub struct AuditRecorder {
    store: SharedStore,
    agents: AgentDirectory,
    limits: RetentionLimits,
}

impl AuditRecorder {
    pub fn new(store: SharedStore, limits: RetentionLimits) -> Self {
        Self {
            agents: AgentDirectory::new(store.clone()),
            store,
            limits,
        }
    }

    /// Record the outcome of a validation.
    ///
    /// Always appends an audit entry. Any decision that is not an outright
    /// allow (including require-approval) also raises a medium
    /// `policy_violation` incident carrying the same `action_id`.
    pub fn record_decision(
        &self,
        request: &ActionRequest,
        action_id: &str,
        decision: &Decision,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, AuditError> {
        let entry = AuditEntry::for_decision(request, action_id, decision, now);
        self.append_entry(&entry)?;

        if !decision.allowed {
            let incident = Incident {
                incident_id: new_id("inc"),
                timestamp: now,
                incident_type: IncidentType::PolicyViolation,
                severity: Severity::Medium,
                description: format!(
                    "Agent '{}' attempted '{}' on '{}' - DENIED: {}",
                    request.agent_id, request.action_type, request.target, decision.reason
                ),
                agent_id: Some(request.agent_id.clone()),
                action_id: Some(action_id.to_string()),
                evidence: serde_json::json!({
                    "matched_policy": decision.matched_policy,
                    "require_approval": decision.require_approval,
                }),
                recommended_action: String::new(),
                status: "open".to_string(),
                resolution: None,
            };
            self.append_incident(&incident)?;
        }
        Ok(entry)
    }

    /// Store a reported incident; a critical one suspends the named agent if
    /// that agent is known.
    ///
    /// Only a failure to store the incident itself is an error. Once it is
    /// stored, a failed suspension is logged and reported in
    /// `suspension_error`.
    pub fn record_incident(
        &self,
        report: IncidentReport,
        now: DateTime<Utc>,
    ) -> Result<IncidentRecord, AuditError> {
        let incident = report.into_incident(new_id("inc"), now);
        self.append_incident(&incident)?;

        let mut agent_suspended = false;
        let mut suspension_error = None;
        if incident.severity == Severity::Critical {
            if let Some(agent_id) = incident.agent_id.as_deref() {
                let reason = format!(
                    "Auto-suspended due to critical incident: {}",
                    incident.incident_id
                );
                match self.agents.suspend(agent_id, &reason, now) {
                    Ok(true) => agent_suspended = true,
                    Ok(false) => tracing::debug!(
                        agent_id,
                        incident_id = %incident.incident_id,
                        "critical incident names an unknown agent; nothing to suspend"
                    ),
                    Err(e) => {
                        tracing::warn!(
                            agent_id,
                            incident_id = %incident.incident_id,
                            error = %e,
                            "failed to suspend agent for critical incident"
                        );
                        suspension_error = Some(e.to_string());
                    }
                }
            }
        }

        tracing::info!(
            incident_id = %incident.incident_id,
            incident_type = %incident.incident_type,
            severity = %incident.severity,
            agent_suspended,
            "incident recorded"
        );
        Ok(IncidentRecord {
            incident,
            agent_suspended,
            suspension_error,
        })
    }

    /// Record an administrative operation under the system actor.
    pub fn record_system_event(
        &self,
        actor: &str,
        kind: &str,
        target: &str,
        parameters: serde_json::Value,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, AuditError> {
        let entry = AuditEntry::system(actor, kind, target, parameters, reason, now);
        self.append_entry(&entry)?;
        Ok(entry)
    }

    /// Every readable audit entry, oldest first.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        self.read_all(Collection::AuditLog)
    }

    /// Every readable incident, oldest first.
    pub fn incidents(&self) -> Result<Vec<Incident>, AuditError> {
        self.read_all(Collection::Incidents)
    }

    fn append_entry(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let value = serde_json::to_value(entry)?;
        self.store
            .append(Collection::AuditLog, &value, self.limits.max_audit_entries)?;
        Ok(())
    }

    fn append_incident(&self, incident: &Incident) -> Result<(), AuditError> {
        let value = serde_json::to_value(incident)?;
        self.store
            .append(Collection::Incidents, &value, self.limits.max_incidents)?;
        Ok(())
    }

    fn read_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, AuditError> {
        let items = match self.store.read(collection)? {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                tracing::warn!(%collection, "collection is not an array; treating as empty");
                return Ok(Vec::new());
            }
            None => return Ok(Vec::new()),
        };

        let mut parsed = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value(item) {
                Ok(record) => parsed.push(record),
                Err(e) => {
                    tracing::warn!(%collection, index, error = %e, "skipping unreadable record")
                }
            }
        }
        Ok(parsed)
    }
}
