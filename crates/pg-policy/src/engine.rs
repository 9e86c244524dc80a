// engine.rs — Decision evaluation.
//
// Every action request is checked in this order, and the first terminal
// check decides:
//
// 1. Is the agent suspended?                        → Deny
// 2. Does the target match the agent's denied_tools? → Deny
// 3. Is there a restrictive allowed_tools list the target misses? → Deny
// 4. Walk enabled policies (descending priority), rules in order:
//    - trust_level_at_least unmet on a `deny` rule   → Deny
//    - trust_level_below met on a `deny` rule        → Deny
//    - trust_level_below met on `require_approval`   → RequireApproval
// 5. Nothing triggered                               → Allow
//
// Unlike a capability gate this is default-allow: policies are blocklists.
// `trust_level_at_least` only ever blocks; an `allow` or `require_approval`
// rule is never triggered by it. A rule with neither trust clause never
// triggers at all, whatever its action.
//
// `evaluate` is pure. `PolicyEngine::decide` wraps it with the directory and
// policy lookups, including the auto-registration write for unknown agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pg_store::SharedStore;

use crate::agent::{allows_everything, Agent, AgentDirectory};
use crate::error::PolicyError;
use crate::pattern::{matches, matches_any};
use crate::policy::{Policy, PolicyStore, Rule, RuleAction};

/// `matched_policy` value for decisions made by suspension.
pub const AGENT_SUSPENDED: &str = "agent_suspended";
/// `matched_policy` value for decisions made by an agent's denied_tools.
pub const AGENT_DENIED_TOOLS: &str = "agent_denied_tools";
/// `matched_policy` value for decisions made by an agent's allowed_tools.
pub const AGENT_ALLOWED_TOOLS: &str = "agent_allowed_tools";
/// `matched_policy` value when nothing triggered.
pub const DEFAULT_ALLOW: &str = "default_allow";

/// A proposed agent action, as submitted for validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Declared kind of action (`tool_call`, `data_write`, ...).
    pub action_type: String,
    /// Tool name or resource the action touches.
    pub target: String,
    pub agent_id: String,
    /// Tool parameters, already parsed. `{}` when none were supplied.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Free-text context supplied by the agent.
    #[serde(default)]
    pub context: String,
}

/// The three possible outcomes, for callers that want to `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Allow,
    Deny,
    RequireApproval,
}

/// The result of evaluating one request.
///
/// `allowed` is false for both denials and approval requests; the
/// `require_approval` flag tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub require_approval: bool,
    pub reason: String,
    /// Policy id, or one of the `AGENT_*` / `DEFAULT_ALLOW` markers.
    pub matched_policy: String,
    /// Index of the triggering rule within `matched_policy`, for policy decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<usize>,
}

impl Decision {
    fn deny(reason: String, matched_policy: &str, matched_rule: Option<usize>) -> Self {
        Self {
            allowed: false,
            require_approval: false,
            reason,
            matched_policy: matched_policy.to_string(),
            matched_rule,
        }
    }

    fn require_approval(reason: String, matched_policy: &str, matched_rule: usize) -> Self {
        Self {
            allowed: false,
            require_approval: true,
            reason,
            matched_policy: matched_policy.to_string(),
            matched_rule: Some(matched_rule),
        }
    }

    fn default_allow() -> Self {
        Self {
            allowed: true,
            require_approval: false,
            reason: "default allow".to_string(),
            matched_policy: DEFAULT_ALLOW.to_string(),
            matched_rule: None,
        }
    }

    pub fn kind(&self) -> DecisionKind {
        if self.allowed {
            DecisionKind::Allow
        } else if self.require_approval {
            DecisionKind::RequireApproval
        } else {
            DecisionKind::Deny
        }
    }
}

/// One check performed during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which check ran (`suspension`, `denied_tools`, `policy:<id>#<rule>`, ...).
    pub check: String,
    /// What it found (`passed`, `skipped: ...`, `triggered: ...`).
    pub outcome: String,
    /// Whether this step produced the final decision.
    pub terminal: bool,
}

/// The decision plus every check that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub decision: Decision,
    pub steps: Vec<EvaluationStep>,
}

struct TraceBuilder {
    steps: Vec<EvaluationStep>,
}

impl TraceBuilder {
    fn step(&mut self, check: impl Into<String>, outcome: impl Into<String>) {
        let step = EvaluationStep {
            check: check.into(),
            outcome: outcome.into(),
            terminal: false,
        };
        tracing::debug!(check = %step.check, outcome = %step.outcome, "evaluation step");
        self.steps.push(step);
    }

    fn finish(
        mut self,
        check: impl Into<String>,
        outcome: impl Into<String>,
        decision: Decision,
    ) -> EvaluationTrace {
        let step = EvaluationStep {
            check: check.into(),
            outcome: outcome.into(),
            terminal: true,
        };
        tracing::debug!(check = %step.check, outcome = %step.outcome, "evaluation decided");
        self.steps.push(step);
        EvaluationTrace {
            decision,
            steps: self.steps,
        }
    }
}

/// Evaluate `request` for `agent` against `policies`.
///
/// `policies` must already be in priority order; disabled ones are skipped.
pub fn evaluate(request: &ActionRequest, agent: &Agent, policies: &[Policy]) -> EvaluationTrace {
    let mut trace = TraceBuilder { steps: Vec::new() };
    let target = request.target.as_str();

    // 1. Suspension.
    if agent.is_suspended() {
        let reason = match agent.suspension_reason.as_deref().filter(|r| !r.is_empty()) {
            Some(why) => format!("Agent '{}' is suspended: {}", agent.agent_id, why),
            None => format!("Agent '{}' is suspended", agent.agent_id),
        };
        return trace.finish(
            "suspension",
            "failed: agent suspended",
            Decision::deny(reason, AGENT_SUSPENDED, None),
        );
    }
    trace.step("suspension", "passed");

    // 2. Explicit deny list.
    if matches_any(&agent.denied_tools, target) {
        return trace.finish(
            "denied_tools",
            format!("failed: '{}' is denied", target),
            Decision::deny(
                format!(
                    "Tool '{}' is explicitly denied for agent '{}'",
                    target, agent.agent_id
                ),
                AGENT_DENIED_TOOLS,
                None,
            ),
        );
    }
    trace.step("denied_tools", "passed");

    // 3. Restrictive allow list.
    if allows_everything(&agent.allowed_tools) {
        trace.step("allowed_tools", "passed: unrestricted");
    } else if matches_any(&agent.allowed_tools, target) {
        trace.step("allowed_tools", "passed");
    } else {
        return trace.finish(
            "allowed_tools",
            format!("failed: '{}' not in allowed list", target),
            Decision::deny(
                format!(
                    "Tool '{}' is not in allowed list for agent '{}'",
                    target, agent.agent_id
                ),
                AGENT_ALLOWED_TOOLS,
                None,
            ),
        );
    }

    // 4. Policies.
    let score = agent.trust_level.score();
    for policy in policies.iter().filter(|p| p.enabled) {
        for (index, rule) in policy.rules.iter().enumerate() {
            let check = format!("policy:{}#{}", policy.id, index);
            match apply_rule(policy, index, rule, request, agent, score) {
                RuleOutcome::Skipped(why) => trace.step(check, format!("skipped: {}", why)),
                RuleOutcome::NotTriggered => trace.step(check, "not triggered"),
                RuleOutcome::Decided(decision) => {
                    let outcome = format!("triggered: {}", rule.action);
                    return trace.finish(check, outcome, decision);
                }
            }
        }
    }

    // 5. Default allow.
    trace.finish("default", "allow", Decision::default_allow())
}

enum RuleOutcome {
    Skipped(&'static str),
    NotTriggered,
    Decided(Decision),
}

fn apply_rule(
    policy: &Policy,
    index: usize,
    rule: &Rule,
    request: &ActionRequest,
    agent: &Agent,
    score: u8,
) -> RuleOutcome {
    let condition = &rule.condition;
    if let Some(pattern) = condition.tool_pattern() {
        if !matches(pattern, &request.target) {
            return RuleOutcome::Skipped("tool_pattern mismatch");
        }
    }
    if let Some(pattern) = condition.action_type() {
        if !matches(pattern, &request.action_type) {
            return RuleOutcome::Skipped("action_type mismatch");
        }
    }

    if let Some(required) = condition.trust_level_at_least {
        if score < required.score() && rule.action == RuleAction::Deny {
            return RuleOutcome::Decided(Decision::deny(
                format!(
                    "Tool '{}' requires trust level '{}', agent has '{}'",
                    request.target, required, agent.trust_level
                ),
                &policy.id,
                Some(index),
            ));
        }
    }

    if let Some(below) = condition.trust_level_below {
        if score < below.score() {
            match rule.action {
                RuleAction::Deny => {
                    let reason = rule
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("Access denied by policy '{}'", policy.id));
                    return RuleOutcome::Decided(Decision::deny(reason, &policy.id, Some(index)));
                }
                RuleAction::RequireApproval => {
                    let reason = rule
                        .message
                        .clone()
                        .unwrap_or_else(|| "This action requires human approval".to_string());
                    return RuleOutcome::Decided(Decision::require_approval(
                        reason, &policy.id, index,
                    ));
                }
                RuleAction::Allow => {}
            }
        }
    }

    RuleOutcome::NotTriggered
}

/// The outcome of `PolicyEngine::decide`.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: Decision,
    /// The agent as it was evaluated.
    pub agent: Agent,
    /// False when the agent was auto-registered by this call.
    pub agent_existed: bool,
    pub trace: EvaluationTrace,
}

/// Resolves agents and policies from the store and evaluates requests.
#[derive(Clone)]
pub struct PolicyEngine {
    agents: AgentDirectory,
    policies: PolicyStore,
}

impl PolicyEngine {
    pub fn new(store: SharedStore) -> Self {
        Self {
            agents: AgentDirectory::new(store.clone()),
            policies: PolicyStore::new(store),
        }
    }

    pub fn agents(&self) -> &AgentDirectory {
        &self.agents
    }

    pub fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    /// Decide on a request.
    ///
    /// Unknown agents are registered (and persisted) with low trust first.
    /// Storage errors propagate; callers must treat them as a denial.
    pub fn decide(
        &self,
        request: &ActionRequest,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, PolicyError> {
        let (agent, agent_existed) = self.agents.resolve_or_create(&request.agent_id, now)?;
        let policies = self.policies.list_enabled()?;
        let trace = evaluate(request, &agent, &policies);

        tracing::debug!(
            agent_id = %request.agent_id,
            target = %request.target,
            allowed = trace.decision.allowed,
            require_approval = trace.decision.require_approval,
            matched_policy = %trace.decision.matched_policy,
            "action evaluated"
        );
        Ok(DecisionOutcome {
            decision: trace.decision.clone(),
            agent,
            agent_existed,
            trace,
        })
    }
}
