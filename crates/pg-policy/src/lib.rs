//! # pg-policy
//!
//! Agent trust resolution and policy decisions for PolicyGuard.
//!
//! Before an agent performs an action it submits an [`ActionRequest`]. The
//! [`PolicyEngine`] resolves the agent in the [`AgentDirectory`] (registering
//! unknown agents on the spot), then walks the agent's own tool lists and the
//! enabled policies from the [`PolicyStore`] to produce a single
//! [`Decision`]: allow, deny, or require approval.
//!
//! ## Key invariants
//!
//! - **Suspension wins**: a suspended agent is denied before anything else is
//!   consulted.
//! - **Explicit deny wins**: an agent's `denied_tools` beat its
//!   `allowed_tools` and every policy.
//! - **Default allow**: this is a blocklist gate. If no rule denies or
//!   requires approval, the action is allowed.
//! - **First decisive rule wins**: policies are walked in descending
//!   priority, rules in declared order; the first deny or require-approval
//!   stops evaluation.

pub mod agent;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod policy;
pub mod trust;

pub use agent::{
    Agent, AgentDirectory, AgentRegistration, AgentStatus, RegistrationOutcome,
    AUTO_REGISTERED_PREFIX,
};
pub use engine::{
    evaluate, ActionRequest, Decision, DecisionKind, DecisionOutcome, EvaluationStep,
    EvaluationTrace, PolicyEngine, AGENT_ALLOWED_TOOLS, AGENT_DENIED_TOOLS, AGENT_SUSPENDED,
    DEFAULT_ALLOW,
};
pub use error::PolicyError;
pub use pattern::matches;
pub use policy::{
    inert_rule_warnings, parse_rules, validate_rules, Policy, PolicyDefinition, PolicyStore, Rule,
    RuleAction, RuleCondition, UpsertOutcome, DEFAULT_PRIORITY,
};
pub use trust::TrustLevel;
