// guardian.rs — The PolicyGuard operations, independent of transport.
//
// Guardian is what the MCP tools (and the CLI) call. It owns the boundary
// between loosely typed tool input and the typed core:
//
// - JSON-text arguments (`parameters`, tool lists, `metadata`, `rules`,
//   `evidence`) are parsed exactly once, here. Malformed text degrades to an
//   empty default with a warning instead of failing the call.
// - Every operation returns a structured response. Storage failures become
//   `success: false` (or, for validation, a fail-closed denial); they never
//   escape as protocol errors.
// - Audit and incident writes that fail after a decision has been made are
//   logged and swallowed: the caller still gets the decision.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pg_audit::{
    new_id, query, AuditPage, AuditQuery, AuditRecorder, ComplianceReport, IncidentReport,
    IncidentType, ReportOptions, Severity, DEFAULT_LIMIT,
};
use pg_policy::{
    inert_rule_warnings, parse_rules, ActionRequest, AgentRegistration, Decision,
    PolicyDefinition, PolicyEngine, DEFAULT_PRIORITY,
};
use pg_store::{JsonFileStore, SharedStore};

use crate::config::GuardConfig;
use crate::error::GatewayError;

/// `matched_policy` recorded when evaluation could not run at all.
pub const EVALUATION_ERROR: &str = "evaluation_error";

// ── Tool inputs ──────────────────────────────────────────────────

/// Input to `validate_action`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ValidateActionParams {
    /// Kind of action, e.g. "tool_call", "resource_access", "data_write".
    pub action_type: String,
    /// Tool name or resource the action targets, e.g. "delete_records".
    pub target: String,
    /// Identifier of the agent requesting the action.
    pub agent_id: String,
    /// Tool parameters as a JSON object string.
    #[serde(default = "empty_object_text")]
    pub parameters: String,
    /// Why the agent wants to do this.
    #[serde(default)]
    pub context: String,
}

/// Input to `register_agent`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RegisterAgentParams {
    /// Unique agent identifier.
    pub agent_id: String,
    /// Human-readable agent name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// One of "low", "medium", "high", "admin". Defaults to "medium".
    #[serde(default = "default_trust_level")]
    pub trust_level: String,
    /// JSON array of tool patterns the agent may use, e.g. ["read_*"]. Empty means any.
    #[serde(default = "empty_array_text")]
    pub allowed_tools: String,
    /// JSON array of tool patterns the agent may never use.
    #[serde(default = "empty_array_text")]
    pub denied_tools: String,
    /// Free-form JSON object stored with the agent.
    #[serde(default = "empty_object_text")]
    pub metadata: String,
}

/// Input to `create_policy`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreatePolicyParams {
    /// Unique policy identifier. An existing policy with this id is replaced.
    pub policy_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON array of rules: [{"condition": {...}, "action": "deny", "message": "..."}].
    pub rules: String,
    /// Higher priorities are evaluated first. Defaults to 100.
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Input to `report_incident`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReportIncidentParams {
    /// policy_violation, suspicious_activity, unauthorized_access,
    /// rate_limit_exceeded, data_exfiltration, configuration_error or other.
    pub incident_type: String,
    /// low, medium, high or critical. Critical suspends the agent.
    pub severity: String,
    pub description: String,
    /// Agent involved, if any.
    #[serde(default)]
    pub agent_id: String,
    /// Supporting evidence as a JSON string.
    #[serde(default = "empty_object_text")]
    pub evidence: String,
    #[serde(default)]
    pub recommended_action: String,
}

/// Input to `get_audit_log`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AuditLogParams {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub action_type: String,
    /// "<n>m", "<n>h" or "<n>d". Defaults to "24h".
    #[serde(default = "default_time_range")]
    pub time_range: String,
    /// "allowed", "denied", or empty for both.
    #[serde(default)]
    pub status: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for AuditLogParams {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            action_type: String::new(),
            time_range: default_time_range(),
            status: String::new(),
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Input to `get_compliance_status`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ComplianceParams {
    /// "1h", "24h", "7d" or "30d". Defaults to "24h".
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_true")]
    pub include_incidents: bool,
    #[serde(default = "default_true")]
    pub include_policy_summary: bool,
}

impl Default for ComplianceParams {
    fn default() -> Self {
        Self {
            time_range: default_time_range(),
            include_incidents: true,
            include_policy_summary: true,
        }
    }
}

fn empty_object_text() -> String {
    "{}".to_string()
}

fn empty_array_text() -> String {
    "[]".to_string()
}

fn default_trust_level() -> String {
    "medium".to_string()
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

fn default_true() -> bool {
    true
}

fn default_time_range() -> String {
    "24h".to_string()
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

// ── Responses ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateActionResponse {
    pub action_id: String,
    pub allowed: bool,
    pub require_approval: bool,
    pub reason: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterAgentResponse {
    pub success: bool,
    pub agent_id: String,
    pub message: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePolicyResponse {
    pub success: bool,
    pub policy_id: String,
    pub message: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportIncidentResponse {
    pub incident_id: String,
    pub success: bool,
    pub message: String,
    pub agent_suspended: bool,
    pub severity: String,
    #[serde(rename = "type")]
    pub incident_type: String,
}

// ── Guardian ─────────────────────────────────────────────────────

/// The PolicyGuard core: policy engine plus audit recorder over one store.
pub struct Guardian {
    config: GuardConfig,
    engine: PolicyEngine,
    recorder: AuditRecorder,
}

impl Guardian {
    /// Open the JSON file store in `config.data_dir` (creating it if needed).
    pub fn new(config: GuardConfig) -> Result<Self, GatewayError> {
        let store = JsonFileStore::new(&config.data_dir)?;
        tracing::info!(data_dir = %config.data_dir.display(), "opened policyguard data directory");
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Build over an existing store (for testing).
    pub fn with_store(config: GuardConfig, store: SharedStore) -> Self {
        Self {
            engine: PolicyEngine::new(store.clone()),
            recorder: AuditRecorder::new(store, config.retention()),
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    /// Decide whether an agent may perform an action, and record the outcome.
    pub fn validate_action(&self, params: ValidateActionParams) -> ValidateActionResponse {
        let now = Utc::now();
        let action_id = new_id("act");
        let mut warnings = Vec::new();

        let parameters = match parse_json_arg(&params.parameters) {
            Ok(Some(value)) => value,
            Ok(None) => json!({}),
            Err(e) => {
                warnings.push(format!(
                    "parameters is not valid JSON ({}); evaluated with empty parameters",
                    e
                ));
                json!({})
            }
        };
        let request = ActionRequest {
            action_type: params.action_type,
            target: params.target,
            agent_id: params.agent_id,
            parameters,
            context: params.context,
        };

        let decision = match self.engine.decide(&request, now) {
            Ok(outcome) => {
                if !outcome.agent_existed {
                    warnings.push(format!(
                        "Agent '{}' was not registered and has been auto-registered with 'low' trust",
                        request.agent_id
                    ));
                }
                outcome.decision
            }
            Err(e) => {
                tracing::error!(
                    action_id = %action_id,
                    agent_id = %request.agent_id,
                    error = %e,
                    "policy evaluation failed; denying"
                );
                Decision {
                    allowed: false,
                    require_approval: false,
                    reason: format!("Policy evaluation failed, action denied: {}", e),
                    matched_policy: EVALUATION_ERROR.to_string(),
                    matched_rule: None,
                }
            }
        };

        if let Err(e) = self
            .recorder
            .record_decision(&request, &action_id, &decision, now)
        {
            tracing::warn!(action_id = %action_id, error = %e, "failed to record decision");
        }

        tracing::info!(
            action_id = %action_id,
            agent_id = %request.agent_id,
            action_type = %request.action_type,
            target = %request.target,
            allowed = decision.allowed,
            require_approval = decision.require_approval,
            matched_policy = %decision.matched_policy,
            "action validated"
        );

        ValidateActionResponse {
            action_id,
            allowed: decision.allowed,
            require_approval: decision.require_approval,
            reason: decision.reason,
            warnings,
        }
    }

    /// Create or update an agent.
    pub fn register_agent(&self, params: RegisterAgentParams) -> RegisterAgentResponse {
        let now = Utc::now();
        let agent_id = params.agent_id.clone();
        let mut input_warnings = Vec::new();

        let allowed_tools = parse_tool_list("allowed_tools", &params.allowed_tools, &mut input_warnings);
        let denied_tools = parse_tool_list("denied_tools", &params.denied_tools, &mut input_warnings);
        let metadata = match parse_json_arg(&params.metadata) {
            Ok(Some(value)) => value,
            Ok(None) => json!({}),
            Err(_) => {
                input_warnings.push("metadata is not valid JSON; stored as {}".to_string());
                json!({})
            }
        };

        let registration = AgentRegistration {
            agent_id: params.agent_id,
            name: params.name,
            description: params.description,
            trust_level: params.trust_level,
            allowed_tools,
            denied_tools,
            metadata,
        };

        match self.engine.agents().register(registration, now) {
            Ok(outcome) => {
                let agent = &outcome.agent;
                self.audit_admin(
                    "agent_registration",
                    &agent.agent_id,
                    json!({
                        "trust_level": agent.trust_level,
                        "is_update": outcome.is_update,
                    }),
                    "Agent registration completed",
                    now,
                );
                let mut warnings = outcome.warnings.clone();
                warnings.extend(input_warnings);
                RegisterAgentResponse {
                    success: true,
                    message: format!(
                        "Agent '{}' ({}) {} successfully with trust level '{}'",
                        agent.name,
                        agent.agent_id,
                        if outcome.is_update { "updated" } else { "registered" },
                        agent.trust_level
                    ),
                    agent_id,
                    warnings,
                }
            }
            Err(e) => RegisterAgentResponse {
                success: false,
                agent_id,
                message: e.to_string(),
                warnings: input_warnings,
            },
        }
    }

    /// Create or replace a policy from tool input.
    pub fn create_policy(&self, params: CreatePolicyParams) -> CreatePolicyResponse {
        let rules = match parse_rules(&params.rules) {
            Ok(rules) => rules,
            Err(e) => {
                return CreatePolicyResponse {
                    success: false,
                    policy_id: params.policy_id,
                    message: e.to_string(),
                    warnings: Vec::new(),
                }
            }
        };
        self.apply_policy(PolicyDefinition {
            id: params.policy_id,
            name: params.name,
            description: params.description,
            rules,
            priority: params.priority,
            enabled: params.enabled,
        })
    }

    /// Create or replace an already-typed policy.
    pub fn apply_policy(&self, definition: PolicyDefinition) -> CreatePolicyResponse {
        let now = Utc::now();
        let policy_id = definition.id.clone();
        let warnings = inert_rule_warnings(&definition.rules);

        match self.engine.policies().upsert(definition, now) {
            Ok(outcome) => {
                let policy = &outcome.policy;
                self.audit_admin(
                    "policy_management",
                    &policy.id,
                    json!({
                        "operation": if outcome.is_update { "update" } else { "create" },
                        "rules_count": policy.rules.len(),
                        "enabled": policy.enabled,
                    }),
                    "Policy management completed",
                    now,
                );
                CreatePolicyResponse {
                    success: true,
                    message: format!(
                        "Policy '{}' ({}) {} successfully with {} rules",
                        policy.name,
                        policy.id,
                        if outcome.is_update { "updated" } else { "created" },
                        policy.rules.len()
                    ),
                    policy_id,
                    warnings,
                }
            }
            Err(e) => CreatePolicyResponse {
                success: false,
                policy_id,
                message: e.to_string(),
                warnings,
            },
        }
    }

    /// Log an incident; a critical one suspends the agent it names.
    pub fn report_incident(&self, params: ReportIncidentParams) -> ReportIncidentResponse {
        let now = Utc::now();
        let incident_type = IncidentType::from(params.incident_type.as_str());
        let severity = Severity::from(params.severity.as_str());
        let evidence = match parse_json_arg(&params.evidence) {
            Ok(Some(value)) => value,
            Ok(None) => json!({}),
            Err(_) => json!({ "raw": params.evidence }),
        };
        let agent_id = Some(params.agent_id).filter(|id| !id.is_empty());

        let report = IncidentReport {
            incident_type,
            severity,
            description: params.description,
            agent_id: agent_id.clone(),
            evidence,
            recommended_action: params.recommended_action,
        };

        match self.recorder.record_incident(report, now) {
            Ok(record) => {
                let incident_id = record.incident.incident_id;
                self.audit_admin(
                    "incident_report",
                    &incident_id,
                    json!({
                        "incident_type": incident_type,
                        "severity": severity,
                        "related_agent": agent_id.clone().unwrap_or_default(),
                    }),
                    "Incident logged for investigation",
                    now,
                );

                let mut message =
                    format!("Incident '{}' logged with severity '{}'", incident_id, severity);
                if record.agent_suspended {
                    message.push_str(&format!(
                        " - Agent '{}' has been automatically suspended",
                        agent_id.unwrap_or_default()
                    ));
                } else if let Some(error) = &record.suspension_error {
                    message.push_str(&format!(
                        " - Automatic suspension of agent '{}' failed: {}",
                        agent_id.unwrap_or_default(),
                        error
                    ));
                }
                ReportIncidentResponse {
                    incident_id,
                    success: true,
                    message,
                    agent_suspended: record.agent_suspended,
                    severity: severity.to_string(),
                    incident_type: incident_type.to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to record incident");
                ReportIncidentResponse {
                    incident_id: String::new(),
                    success: false,
                    message: format!("Failed to record incident: {}", e),
                    agent_suspended: false,
                    severity: severity.to_string(),
                    incident_type: incident_type.to_string(),
                }
            }
        }
    }

    /// Filtered audit log, most recent first.
    pub fn get_audit_log(&self, params: AuditLogParams) -> Result<AuditPage, GatewayError> {
        let entries = self.recorder.entries()?;
        let q = AuditQuery {
            agent_id: params.agent_id,
            action_type: params.action_type,
            time_range: params.time_range,
            status: params.status,
            limit: params.limit,
        };
        Ok(query(entries, &q, Utc::now()))
    }

    /// Security posture report for a time window.
    pub fn get_compliance_status(
        &self,
        params: ComplianceParams,
    ) -> Result<ComplianceReport, GatewayError> {
        let entries = self.recorder.entries()?;
        let incidents = self.recorder.incidents()?;
        let policies = self.engine.policies().list()?;
        let agents = self.engine.agents().list()?;

        Ok(ComplianceReport::build(
            &entries,
            &incidents,
            &policies,
            agents.values(),
            &params.time_range,
            ReportOptions {
                include_incidents: params.include_incidents,
                include_policy_summary: params.include_policy_summary,
            },
            Utc::now(),
        ))
    }

    fn audit_admin(
        &self,
        kind: &str,
        target: &str,
        parameters: Value,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        if let Err(e) = self.recorder.record_system_event(
            &self.config.system_actor,
            kind,
            target,
            parameters,
            reason,
            now,
        ) {
            tracing::warn!(kind, target, error = %e, "failed to record administrative audit entry");
        }
    }
}

/// Parse a JSON-text argument. Blank text is `Ok(None)`.
fn parse_json_arg(text: &str) -> Result<Option<Value>, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text).map(Some)
}

/// Parse a JSON array of tool patterns. Anything else becomes `[]` with a
/// warning; non-string items are dropped.
fn parse_tool_list(field: &str, text: &str, warnings: &mut Vec<String>) -> Vec<String> {
    match parse_json_arg(text) {
        Ok(None) => Vec::new(),
        Ok(Some(Value::Array(items))) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Ok(Some(_)) | Err(_) => {
            warnings.push(format!("{} is not a JSON array of strings; treated as []", field));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_store::{Collection, CollectionStore, MemoryStore, StoreError};

    fn guardian() -> Guardian {
        Guardian::with_store(
            GuardConfig::with_data_dir("/unused"),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn json_args() {
        assert_eq!(parse_json_arg("").unwrap(), None);
        assert_eq!(parse_json_arg("  ").unwrap(), None);
        assert_eq!(parse_json_arg("{\"a\":1}").unwrap(), Some(json!({"a": 1})));
        assert!(parse_json_arg("{nope").is_err());
    }

    #[test]
    fn tool_lists_degrade_to_empty() {
        let mut warnings = Vec::new();
        assert_eq!(
            parse_tool_list("allowed_tools", r#"["read_*", 3, "query"]"#, &mut warnings),
            vec!["read_*", "query"]
        );
        assert!(warnings.is_empty());

        assert!(parse_tool_list("allowed_tools", "read_*", &mut warnings).is_empty());
        assert!(parse_tool_list("denied_tools", r#"{"a": 1}"#, &mut warnings).is_empty());
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn malformed_parameters_warn_but_validate() {
        let g = guardian();
        let response = g.validate_action(ValidateActionParams {
            action_type: "tool_call".to_string(),
            target: "read_file".to_string(),
            agent_id: "a".to_string(),
            parameters: "{not json".to_string(),
            context: String::new(),
        });
        assert!(response.allowed);
        assert!(response.action_id.starts_with("act_"));
        assert!(response.warnings.iter().any(|w| w.contains("parameters")));
        assert!(response.warnings.iter().any(|w| w.contains("auto-registered")));

        let entries = g.recorder().entries().unwrap();
        assert_eq!(entries[0].action.parameters, json!({}));
    }

    #[test]
    fn invalid_trust_level_is_a_structured_failure() {
        let g = guardian();
        let response = g.register_agent(RegisterAgentParams {
            agent_id: "a".to_string(),
            name: "A".to_string(),
            description: String::new(),
            trust_level: "root".to_string(),
            allowed_tools: "[]".to_string(),
            denied_tools: "[]".to_string(),
            metadata: "{}".to_string(),
        });
        assert!(!response.success);
        assert!(response.message.contains("Invalid trust level 'root'"));
        assert!(g.engine().agents().get("a").unwrap().is_none());
        assert!(g.recorder().entries().unwrap().is_empty());
    }

    #[test]
    fn bad_evidence_is_kept_raw() {
        let g = guardian();
        let response = g.report_incident(ReportIncidentParams {
            incident_type: "prompt_injection".to_string(),
            severity: "urgent".to_string(),
            description: "odd".to_string(),
            agent_id: String::new(),
            evidence: "saw <script>".to_string(),
            recommended_action: String::new(),
        });
        assert!(response.success);
        assert_eq!(response.incident_type, "other");
        assert_eq!(response.severity, "medium");

        let incidents = g.recorder().incidents().unwrap();
        assert_eq!(incidents[0].evidence, json!({"raw": "saw <script>"}));
        assert!(incidents[0].agent_id.is_none());
    }

    #[test]
    fn admin_operations_are_audited_under_system_actor() {
        let g = guardian();
        g.create_policy(CreatePolicyParams {
            policy_id: "p".to_string(),
            name: "P".to_string(),
            description: String::new(),
            rules: r#"[{"condition": {"tool_pattern": "x", "trust_level_below": "high"}, "action": "deny"}]"#
                .to_string(),
            priority: 100,
            enabled: true,
        });
        let entries = g.recorder().entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].agent_id, "guardian-system");
        assert_eq!(entries[0].action.action_type, "policy_management");
        assert_eq!(entries[0].action.parameters["operation"], "create");
        assert!(entries[0].action_id.is_none());
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: RegisterAgentParams =
            serde_json::from_value(json!({"agent_id": "a", "name": "A"})).unwrap();
        assert_eq!(p.trust_level, "medium");
        assert_eq!(p.allowed_tools, "[]");

        let p: AuditLogParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.time_range, "24h");
        assert_eq!(p.limit, 100);
    }

    /// Memory store with selected collections unreadable or unwritable.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        failing_reads: Vec<Collection>,
        failing_writes: Vec<Collection>,
    }

    fn unavailable(collection: Collection) -> StoreError {
        StoreError::IoError {
            path: collection.file_name().into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "unavailable"),
        }
    }

    impl CollectionStore for FaultyStore {
        fn read(&self, collection: Collection) -> Result<Option<Value>, StoreError> {
            if self.failing_reads.contains(&collection) {
                return Err(unavailable(collection));
            }
            self.inner.read(collection)
        }

        fn write(&self, collection: Collection, document: &Value) -> Result<(), StoreError> {
            if self.failing_writes.contains(&collection) {
                return Err(unavailable(collection));
            }
            self.inner.write(collection, document)
        }
    }

    fn faulty_guardian(store: FaultyStore) -> Guardian {
        Guardian::with_store(GuardConfig::with_data_dir("/unused"), Arc::new(store))
    }

    fn validate(g: &Guardian, target: &str) -> ValidateActionResponse {
        g.validate_action(ValidateActionParams {
            action_type: "tool_call".to_string(),
            target: target.to_string(),
            agent_id: "a".to_string(),
            parameters: "{}".to_string(),
            context: String::new(),
        })
    }

    #[test]
    fn unreadable_agents_fail_closed() {
        let g = faulty_guardian(FaultyStore {
            failing_reads: vec![Collection::Agents],
            ..Default::default()
        });

        let response = validate(&g, "read_file");
        assert!(!response.allowed);
        assert!(!response.require_approval);
        assert!(response.reason.starts_with("Policy evaluation failed"));

        let incidents = g.recorder().incidents().unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].evidence["matched_policy"], EVALUATION_ERROR);
        assert_eq!(incidents[0].action_id.as_deref(), Some(response.action_id.as_str()));
    }

    #[test]
    fn unreadable_policies_fail_closed() {
        let g = faulty_guardian(FaultyStore {
            failing_reads: vec![Collection::Policies],
            ..Default::default()
        });
        let response = validate(&g, "read_file");
        assert!(!response.allowed);
        assert!(response.reason.contains("Policy evaluation failed"));
    }

    #[test]
    fn failed_audit_write_keeps_the_decision() {
        let g = faulty_guardian(FaultyStore {
            failing_writes: vec![Collection::AuditLog],
            ..Default::default()
        });
        g.create_policy(CreatePolicyParams {
            policy_id: "no-delete".to_string(),
            name: "No delete".to_string(),
            description: String::new(),
            rules: r#"[{"condition": {"tool_pattern": "delete_*", "trust_level_below": "admin"}, "action": "deny"}]"#
                .to_string(),
            priority: 100,
            enabled: true,
        });

        let allowed = validate(&g, "read_file");
        assert!(allowed.allowed);
        assert_eq!(allowed.reason, "default allow");

        let denied = validate(&g, "delete_records");
        assert!(!denied.allowed);
        assert_eq!(denied.reason, "Access denied by policy 'no-delete'");
        assert!(g.recorder().entries().unwrap().is_empty());
    }

    #[test]
    fn incident_is_reported_even_if_suspension_fails() {
        let store = FaultyStore {
            failing_writes: vec![Collection::Agents],
            ..Default::default()
        };
        store
            .inner
            .write(
                Collection::Agents,
                &json!({"rogue": {"agent_id": "rogue", "trust_level": "high"}}),
            )
            .unwrap();
        let g = faulty_guardian(store);

        let response = g.report_incident(ReportIncidentParams {
            incident_type: "data_exfiltration".to_string(),
            severity: "critical".to_string(),
            description: "bulk export".to_string(),
            agent_id: "rogue".to_string(),
            evidence: "{}".to_string(),
            recommended_action: String::new(),
        });
        assert!(response.success);
        assert!(!response.agent_suspended);
        assert!(response.incident_id.starts_with("inc_"));
        assert!(response.message.contains("Automatic suspension of agent 'rogue' failed"));

        let incidents = g.recorder().incidents().unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].incident_id, response.incident_id);
        assert!(!g.engine().agents().get("rogue").unwrap().unwrap().is_suspended());
    }
}
