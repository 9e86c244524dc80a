// server.rs — MCP server for PolicyGuard.
//
// PolicyGuardServer implements the rmcp ServerHandler trait and exposes the
// Guardian operations as MCP tools. Tool calls are serialized behind one
// mutex, so each call's read-decide-write cycle runs alone.
//
// Tools:
//   validate_action      : decide allow / deny / require approval, and audit it
//   register_agent       : create or update an agent and its trust level
//   create_policy        : create or replace a policy
//   report_incident      : log an incident (critical suspends the agent)
//   get_audit_log        : filtered audit entries, most recent first
//   get_compliance_status: security posture report for a time window
//
// Failures are returned as JSON results with `success: false`, not as MCP
// errors. Only a serialization failure is an MCP error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;

use crate::config::GuardConfig;
use crate::error::GatewayError;
use crate::guardian::{
    AuditLogParams, ComplianceParams, CreatePolicyParams, Guardian, RegisterAgentParams,
    ReportIncidentParams, ValidateActionParams,
};

/// The PolicyGuard MCP server.
pub struct PolicyGuardServer {
    guardian: Arc<Mutex<Guardian>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PolicyGuardServer {
    /// Create a server over the JSON file store in `config.data_dir`.
    pub fn new(config: GuardConfig) -> Result<Self, GatewayError> {
        Ok(Self::with_guardian(Guardian::new(config)?))
    }

    /// Create a server wrapping an existing guardian (for testing).
    pub fn with_guardian(guardian: Guardian) -> Self {
        Self {
            guardian: Arc::new(Mutex::new(guardian)),
            tool_router: Self::tool_router(),
        }
    }

    /// The shared guardian (for testing).
    pub fn guardian(&self) -> &Arc<Mutex<Guardian>> {
        &self.guardian
    }

    /// Guardian holds no in-memory state between calls, so a panic in one
    /// tool call leaves nothing half-updated and the lock is reusable.
    fn lock(&self) -> MutexGuard<'_, Guardian> {
        self.guardian.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("guardian lock was poisoned by a panicking tool call; recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    #[tool(
        description = "Validate whether an agent may perform an action. Call this BEFORE executing any sensitive tool. Returns allowed, require_approval and a reason; every call is recorded in the audit log."
    )]
    fn validate_action(
        &self,
        Parameters(params): Parameters<ValidateActionParams>,
    ) -> Result<CallToolResult, McpError> {
        let guardian = self.lock();
        json_result(&guardian.validate_action(params))
    }

    #[tool(
        description = "Register or update an AI agent with a trust level (low, medium, high, admin) and optional allowed/denied tool patterns given as JSON arrays."
    )]
    fn register_agent(
        &self,
        Parameters(params): Parameters<RegisterAgentParams>,
    ) -> Result<CallToolResult, McpError> {
        let guardian = self.lock();
        json_result(&guardian.register_agent(params))
    }

    #[tool(
        description = "Create or replace a security policy. rules is a JSON array of {condition: {tool_pattern, action_type, trust_level_at_least, trust_level_below}, action: allow|deny|require_approval, message}."
    )]
    fn create_policy(
        &self,
        Parameters(params): Parameters<CreatePolicyParams>,
    ) -> Result<CallToolResult, McpError> {
        let guardian = self.lock();
        json_result(&guardian.create_policy(params))
    }

    #[tool(
        description = "Report a security incident. A critical incident automatically suspends the agent involved."
    )]
    fn report_incident(
        &self,
        Parameters(params): Parameters<ReportIncidentParams>,
    ) -> Result<CallToolResult, McpError> {
        let guardian = self.lock();
        json_result(&guardian.report_incident(params))
    }

    #[tool(
        description = "Retrieve audit log entries, most recent first. Filter by agent_id, action_type, time_range (e.g. 1h, 24h, 7d) and status (allowed, denied)."
    )]
    fn get_audit_log(
        &self,
        Parameters(params): Parameters<AuditLogParams>,
    ) -> Result<CallToolResult, McpError> {
        let guardian = self.lock();
        match guardian.get_audit_log(params) {
            Ok(page) => json_result(&page),
            Err(e) => failure_result(e),
        }
    }

    #[tool(
        description = "Get a compliance report: denial rate, top offenders, incidents, policy and agent summaries, and an overall healthy/warning/critical status."
    )]
    fn get_compliance_status(
        &self,
        Parameters(params): Parameters<ComplianceParams>,
    ) -> Result<CallToolResult, McpError> {
        let guardian = self.lock();
        match guardian.get_compliance_status(params) {
            Ok(report) => json_result(&report),
            Err(e) => failure_result(e),
        }
    }
}

#[tool_handler]
impl ServerHandler for PolicyGuardServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "policyguard".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("PolicyGuard".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "PolicyGuard is a policy decision point for AI agents. Call \
                 validate_action before any sensitive tool call and honour the \
                 decision. Register agents with register_agent, define rules \
                 with create_policy, and review activity with get_audit_log and \
                 get_compliance_status."
                    .into(),
            ),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let content =
        Content::json(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![content]))
}

fn failure_result(error: GatewayError) -> Result<CallToolResult, McpError> {
    tracing::warn!(error = %error, "tool call failed");
    json_result(&serde_json::json!({
        "success": false,
        "message": error.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_server() -> (PolicyGuardServer, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = GuardConfig::for_project(dir.path());
        let server = PolicyGuardServer::new(config).unwrap();
        (server, dir)
    }

    fn result_json(result: &CallToolResult) -> serde_json::Value {
        let wire = serde_json::to_value(result).unwrap();
        let text = wire["content"][0]["text"]
            .as_str()
            .expect("tool results are JSON text");
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn exposes_six_tools() {
        let (server, _dir) = test_server();
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "create_policy",
                "get_audit_log",
                "get_compliance_status",
                "register_agent",
                "report_incident",
                "validate_action",
            ]
        );
    }

    #[test]
    fn data_directory_created_on_start() {
        let (_server, dir) = test_server();
        assert!(dir.path().join(".policyguard").is_dir());
    }

    #[test]
    fn validate_action_tool_returns_decision_json() {
        let (server, _dir) = test_server();
        let result = server
            .validate_action(Parameters(ValidateActionParams {
                action_type: "tool_call".to_string(),
                target: "read_file".to_string(),
                agent_id: "agent-1".to_string(),
                parameters: "{}".to_string(),
                context: String::new(),
            }))
            .unwrap();
        let body = result_json(&result);
        assert_eq!(body["allowed"], true);
        assert_eq!(body["require_approval"], false);
        assert!(body["action_id"].as_str().unwrap().starts_with("act_"));
    }

    #[test]
    fn get_audit_log_tool_returns_page() {
        let (server, _dir) = test_server();
        server
            .register_agent(Parameters(RegisterAgentParams {
                agent_id: "a".to_string(),
                name: "A".to_string(),
                description: String::new(),
                trust_level: "low".to_string(),
                allowed_tools: "[]".to_string(),
                denied_tools: "[]".to_string(),
                metadata: "{}".to_string(),
            }))
            .unwrap();

        let result = server
            .get_audit_log(Parameters(AuditLogParams::default()))
            .unwrap();
        let body = result_json(&result);
        assert_eq!(body["count"], 1);
        assert_eq!(body["entries"][0]["action"]["type"], "agent_registration");
        assert_eq!(body["filters_applied"][0], "none");
    }

    #[test]
    fn tools_keep_working_after_a_panic_under_the_lock() {
        let (server, _dir) = test_server();
        let guardian = Arc::clone(server.guardian());
        let crashed = std::thread::spawn(move || {
            let _held = guardian.lock().unwrap();
            panic!("tool call crashed");
        })
        .join();
        assert!(crashed.is_err());
        assert!(server.guardian().is_poisoned());

        let result = server
            .validate_action(Parameters(ValidateActionParams {
                action_type: "tool_call".to_string(),
                target: "read_file".to_string(),
                agent_id: "agent-1".to_string(),
                parameters: "{}".to_string(),
                context: String::new(),
            }))
            .unwrap();
        assert_eq!(result_json(&result)["allowed"], true);
    }

    #[test]
    fn malformed_time_range_returns_a_page() {
        let (server, _dir) = test_server();
        for range in ["5é", "100000000d"] {
            let result = server
                .get_audit_log(Parameters(AuditLogParams {
                    time_range: range.to_string(),
                    ..Default::default()
                }))
                .unwrap();
            assert_eq!(result_json(&result)["time_range"], range);
        }
    }

    #[test]
    fn server_info_names_policyguard() {
        let (server, _dir) = test_server();
        let info = server.get_info();
        assert_eq!(info.server_info.name, "policyguard");
        assert!(info.capabilities.tools.is_some());
    }
}
