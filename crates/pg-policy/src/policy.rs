// policy.rs — Policies, rules and the PolicyStore.
//
// A policy is a named, prioritized list of rules. The `policies` collection
// is a JSON array kept in descending priority order after every write; the
// sort is stable, so policies with equal priority keep insertion order and a
// replaced policy keeps its old slot among its peers.
//
// Validation is all-or-nothing: a policy with no rules, or with any rule whose
// condition is empty or whose action is unrecognised, is rejected whole and
// the stored collection is left untouched.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pg_store::{load_or_default, save, Collection, SharedStore};

use crate::error::PolicyError;
use crate::trust::{optional_trust, TrustLevel};

/// Priority given to policies that don't name one.
pub const DEFAULT_PRIORITY: i64 = 100;

/// What a rule does when it triggers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    #[default]
    Deny,
    RequireApproval,
}

impl RuleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
            RuleAction::RequireApproval => "require_approval",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(RuleAction::Allow),
            "deny" => Ok(RuleAction::Deny),
            "require_approval" => Ok(RuleAction::RequireApproval),
            other => Err(other.to_string()),
        }
    }
}

/// The matching criteria of a rule. Every field is optional; an empty
/// string is treated the same as an absent field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Glob over the action target (tool name, resource).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_pattern: Option<String>,
    /// Glob over the action's declared type (`tool_call`, `data_write`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// Agents below this level are denied by a `deny` rule.
    #[serde(
        default,
        deserialize_with = "optional_trust",
        skip_serializing_if = "Option::is_none"
    )]
    pub trust_level_at_least: Option<TrustLevel>,
    /// Agents strictly below this level trigger the rule's action.
    #[serde(
        default,
        deserialize_with = "optional_trust",
        skip_serializing_if = "Option::is_none"
    )]
    pub trust_level_below: Option<TrustLevel>,
}

impl RuleCondition {
    pub fn is_empty(&self) -> bool {
        self.tool_pattern().is_none()
            && self.action_type().is_none()
            && self.trust_level_at_least.is_none()
            && self.trust_level_below.is_none()
    }

    /// The tool pattern, if present and non-empty.
    pub fn tool_pattern(&self) -> Option<&str> {
        self.tool_pattern.as_deref().filter(|p| !p.is_empty())
    }

    /// The action-type pattern, if present and non-empty.
    pub fn action_type(&self) -> Option<&str> {
        self.action_type.as_deref().filter(|p| !p.is_empty())
    }

    /// Whether either trust clause is present. Rules without one never
    /// produce a decisive outcome.
    pub fn has_trust_clause(&self) -> bool {
        self.trust_level_at_least.is_some() || self.trust_level_below.is_some()
    }
}

/// One rule inside a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub condition: RuleCondition,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Rule {
    /// Parse one rule from wire JSON, naming the rule index in any error.
    pub fn from_json(index: usize, value: &serde_json::Value) -> Result<Self, PolicyError> {
        let object = value
            .as_object()
            .ok_or_else(|| PolicyError::InvalidPolicy(format!("Rule {} must be an object", index)))?;

        let action = match object.get("action") {
            None | Some(serde_json::Value::Null) => RuleAction::default(),
            Some(serde_json::Value::String(s)) => s.parse().map_err(|bad| {
                PolicyError::InvalidPolicy(format!(
                    "Rule {} has invalid action '{}'. Must be one of: allow, deny, require_approval",
                    index, bad
                ))
            })?,
            Some(other) => {
                return Err(PolicyError::InvalidPolicy(format!(
                    "Rule {} has invalid action '{}'. Must be one of: allow, deny, require_approval",
                    index, other
                )))
            }
        };

        let condition = match object.get("condition") {
            Some(raw @ serde_json::Value::Object(_)) => {
                serde_json::from_value::<RuleCondition>(raw.clone()).map_err(|e| {
                    PolicyError::InvalidPolicy(format!(
                        "Rule {} has a malformed condition: {}",
                        index, e
                    ))
                })?
            }
            _ => RuleCondition::default(),
        };
        if condition.is_empty() {
            return Err(PolicyError::InvalidPolicy(format!(
                "Rule {} must have a 'condition' object",
                index
            )));
        }

        let message = object
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Ok(Self {
            condition,
            action,
            message,
        })
    }
}

/// Parse the JSON text of a rule list. Empty text is an empty list.
///
/// Structural problems (not an array, a non-object rule, an empty condition,
/// an unknown action) are reported as `InvalidPolicy`. An empty list parses
/// fine; `validate_rules` rejects it.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, PolicyError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| PolicyError::InvalidPolicy(format!("Invalid rules JSON: {}", e)))?;
    let items = value
        .as_array()
        .ok_or_else(|| PolicyError::InvalidPolicy("rules must be a JSON array".to_string()))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| Rule::from_json(i, item))
        .collect()
}

/// Check the invariants every stored policy must satisfy.
pub fn validate_rules(rules: &[Rule]) -> Result<(), PolicyError> {
    if rules.is_empty() {
        return Err(PolicyError::InvalidPolicy(
            "Policy must have at least one rule".to_string(),
        ));
    }
    for (i, rule) in rules.iter().enumerate() {
        if rule.condition.is_empty() {
            return Err(PolicyError::InvalidPolicy(format!(
                "Rule {} must have a 'condition' object",
                i
            )));
        }
    }
    Ok(())
}

/// Describe deny / require-approval rules that can never trigger because
/// they carry no trust-level clause.
pub fn inert_rule_warnings(rules: &[Rule]) -> Vec<String> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.action != RuleAction::Allow && !rule.condition.has_trust_clause())
        .map(|(i, rule)| {
            format!(
                "Rule {} ('{}') has no trust_level_at_least or trust_level_below condition and will never trigger",
                i, rule.action
            )
        })
        .collect()
}

/// A stored policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Higher priorities are evaluated first.
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

/// A policy as submitted for creation or replacement, before timestamps.
///
/// Also the on-disk shape of policy bundle files loaded by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Result of a successful upsert.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub policy: Policy,
    /// True when an existing policy with the same id was replaced.
    pub is_update: bool,
}

/// The policy set, backed by the `policies` collection.
#[derive(Clone)]
pub struct PolicyStore {
    store: SharedStore,
}

impl PolicyStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// All policies in stored (priority) order.
    pub fn list(&self) -> Result<Vec<Policy>, PolicyError> {
        Ok(load_or_default(self.store.as_ref(), Collection::Policies)?)
    }

    /// Enabled policies in stored (priority) order.
    pub fn list_enabled(&self) -> Result<Vec<Policy>, PolicyError> {
        Ok(self.list()?.into_iter().filter(|p| p.enabled).collect())
    }

    pub fn get(&self, policy_id: &str) -> Result<Option<Policy>, PolicyError> {
        Ok(self.list()?.into_iter().find(|p| p.id == policy_id))
    }

    /// Insert or replace a policy by id, then re-sort by priority.
    pub fn upsert(
        &self,
        definition: PolicyDefinition,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, PolicyError> {
        validate_rules(&definition.rules)?;

        let mut policies = self.list()?;
        let existing = policies.iter().position(|p| p.id == definition.id);

        let policy = Policy {
            created_at: Some(
                existing
                    .and_then(|i| policies[i].created_at)
                    .unwrap_or(now),
            ),
            updated_at: Some(now),
            id: definition.id,
            name: definition.name,
            description: definition.description,
            rules: definition.rules,
            priority: definition.priority,
            enabled: definition.enabled,
        };

        match existing {
            Some(i) => policies[i] = policy.clone(),
            None => policies.push(policy.clone()),
        }
        // `sort_by` is stable: equal priorities keep their relative order.
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));
        save(self.store.as_ref(), Collection::Policies, &policies)?;

        tracing::info!(
            policy_id = %policy.id,
            rules = policy.rules.len(),
            priority = policy.priority,
            enabled = policy.enabled,
            is_update = existing.is_some(),
            "policy stored"
        );
        Ok(UpsertOutcome {
            policy,
            is_update: existing.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pg_store::{CollectionStore, MemoryStore};
    use std::sync::Arc;

    fn store() -> (PolicyStore, Arc<MemoryStore>) {
        let backing = Arc::new(MemoryStore::new());
        (PolicyStore::new(backing.clone()), backing)
    }

    fn deny_below_admin(pattern: &str) -> Rule {
        Rule {
            condition: RuleCondition {
                tool_pattern: Some(pattern.to_string()),
                trust_level_below: Some(TrustLevel::Admin),
                ..Default::default()
            },
            action: RuleAction::Deny,
            message: Some("needs admin".to_string()),
        }
    }

    fn definition(id: &str, priority: i64) -> PolicyDefinition {
        PolicyDefinition {
            id: id.to_string(),
            name: format!("Policy {}", id),
            description: String::new(),
            rules: vec![deny_below_admin("delete_*")],
            priority,
            enabled: true,
        }
    }

    #[test]
    fn parse_rules_accepts_wire_format() {
        let rules = parse_rules(
            r#"[{"condition": {"tool_pattern": "delete_*", "trust_level_below": "admin"},
                 "action": "deny", "message": "Delete requires admin"},
                {"condition": {"action_type": "data_read"}, "action": "require_approval"}]"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].condition.tool_pattern(), Some("delete_*"));
        assert_eq!(rules[0].condition.trust_level_below, Some(TrustLevel::Admin));
        assert_eq!(rules[0].message.as_deref(), Some("Delete requires admin"));
        assert_eq!(rules[1].action, RuleAction::RequireApproval);
        assert!(rules[1].message.is_none());
    }

    #[test]
    fn parse_rules_defaults_missing_action_to_deny() {
        let rules = parse_rules(r#"[{"condition": {"tool_pattern": "x"}}]"#).unwrap();
        assert_eq!(rules[0].action, RuleAction::Deny);
    }

    #[test]
    fn parse_rules_rejects_invalid_action_with_index() {
        let err = parse_rules(
            r#"[{"condition": {"tool_pattern": "a"}, "action": "allow"},
                {"condition": {"tool_pattern": "b"}, "action": "explode"}]"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Rule 1"));
        assert!(msg.contains("explode"));
    }

    #[test]
    fn parse_rules_rejects_empty_condition() {
        for json in [
            r#"[{"action": "deny"}]"#,
            r#"[{"condition": {}, "action": "deny"}]"#,
            r#"[{"condition": {"tool_pattern": ""}, "action": "deny"}]"#,
            r#"[{"condition": "delete_*", "action": "deny"}]"#,
        ] {
            let err = parse_rules(json).unwrap_err();
            assert!(
                err.to_string().contains("must have a 'condition' object"),
                "unexpected error for {}: {}",
                json,
                err
            );
        }
    }

    #[test]
    fn parse_rules_rejects_non_array_and_bad_json() {
        assert!(matches!(
            parse_rules(r#"{"condition": {}}"#),
            Err(PolicyError::InvalidPolicy(_))
        ));
        assert!(matches!(parse_rules("[{"), Err(PolicyError::InvalidPolicy(_))));
        assert!(matches!(parse_rules(r#"["deny"]"#), Err(PolicyError::InvalidPolicy(_))));
        assert!(parse_rules("").unwrap().is_empty());
    }

    #[test]
    fn empty_rule_list_is_rejected_and_nothing_written() {
        let (policies, backing) = store();
        policies.upsert(definition("keep", 100), Utc::now()).unwrap();
        let before = backing.read(Collection::Policies).unwrap();

        let mut empty = definition("empty", 100);
        empty.rules.clear();
        let result = policies.upsert(empty, Utc::now());

        assert!(matches!(result, Err(PolicyError::InvalidPolicy(_))));
        assert_eq!(backing.read(Collection::Policies).unwrap(), before);
    }

    #[test]
    fn policies_sorted_by_descending_priority_stably() {
        let (policies, _) = store();
        let now = Utc::now();
        policies.upsert(definition("a", 50), now).unwrap();
        policies.upsert(definition("b", 200), now).unwrap();
        policies.upsert(definition("c", 50), now).unwrap();
        policies.upsert(definition("d", 100), now).unwrap();

        let ids: Vec<String> = policies.list().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn replace_preserves_created_at_and_slot() {
        let (policies, _) = store();
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        policies.upsert(definition("a", 100), t0).unwrap();
        policies.upsert(definition("b", 100), t0).unwrap();

        let mut replacement = definition("a", 100);
        replacement.name = "Renamed".to_string();
        let outcome = policies.upsert(replacement, t1).unwrap();

        assert!(outcome.is_update);
        assert_eq!(outcome.policy.created_at, Some(t0));
        assert_eq!(outcome.policy.updated_at, Some(t1));

        let stored = policies.list().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].id, "a");
        assert_eq!(stored[0].name, "Renamed");
    }

    #[test]
    fn list_enabled_filters_disabled() {
        let (policies, _) = store();
        let mut off = definition("off", 500);
        off.enabled = false;
        policies.upsert(off, Utc::now()).unwrap();
        policies.upsert(definition("on", 1), Utc::now()).unwrap();

        let enabled = policies.list_enabled().unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "on");
        assert!(policies.get("off").unwrap().is_some());
    }

    #[test]
    fn inert_rules_are_reported() {
        let rules = parse_rules(
            r#"[{"condition": {"tool_pattern": "drop_*"}, "action": "deny"},
                {"condition": {"tool_pattern": "read_*"}, "action": "allow"},
                {"condition": {"tool_pattern": "x", "trust_level_below": "high"}, "action": "require_approval"}]"#,
        )
        .unwrap();
        let warnings = inert_rule_warnings(&rules);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Rule 0"));
    }

    #[test]
    fn policy_definition_loads_from_yaml() {
        let yaml = r#"
id: prod-db
name: Production database
rules:
  - condition:
      tool_pattern: "drop_*"
      trust_level_below: admin
    action: deny
    message: Dropping tables requires admin
"#;
        let def: PolicyDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.priority, DEFAULT_PRIORITY);
        assert!(def.enabled);
        assert_eq!(def.rules[0].condition.trust_level_below, Some(TrustLevel::Admin));
    }

    #[test]
    fn stored_policies_without_timestamps_load() {
        let (policies, backing) = store();
        backing
            .write(
                Collection::Policies,
                &serde_json::json!([{
                    "id": "legacy",
                    "name": "Legacy",
                    "rules": [{"condition": {"tool_pattern": "x", "trust_level_at_least": "high"}, "action": "deny"}]
                }]),
            )
            .unwrap();
        let p = policies.get("legacy").unwrap().unwrap();
        assert_eq!(p.priority, DEFAULT_PRIORITY);
        assert!(p.enabled);
        assert!(p.created_at.is_none());
    }
}
