// agent.rs — Agent records and the AgentDirectory.
//
// The directory is the `agents` collection: a JSON object keyed by agent id.
// Agents are never deleted. They enter the directory in one of two ways:
//
// - explicitly, through `register()` (trust level validated, fields
//   overwritten on re-registration, `registered_at` preserved);
// - implicitly, through `resolve_or_create()` the first time an unknown id
//   submits an action. That call WRITES: the synthesized low-trust record is
//   persisted before any decision is made, so every requesting agent becomes
//   durably known whether or not its action is later denied.
//
// The only other mutation is `suspend()`, which touches status, reason and
// timestamp and nothing else.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pg_store::{load_or_default, save, Collection, SharedStore};

use crate::error::PolicyError;
use crate::trust::TrustLevel;

/// Display-name prefix given to agents created by `resolve_or_create`.
pub const AUTO_REGISTERED_PREFIX: &str = "Auto-registered: ";

/// Whether an agent may act at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AgentStatus {
    #[default]
    Active,
    Suspended,
}

impl From<String> for AgentStatus {
    fn from(s: String) -> Self {
        if s == "suspended" {
            AgentStatus::Suspended
        } else {
            AgentStatus::Active
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// A registered (or auto-registered) agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    /// Unique, externally supplied identifier.
    #[serde(default)]
    pub agent_id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// Tool patterns this agent may use. Empty (or `["*"]`) means unrestricted.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Tool patterns this agent may never use. Checked before everything else.
    #[serde(default)]
    pub denied_tools: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension_reason: Option<String>,
}

impl Agent {
    /// The record synthesized for an agent id seen for the first time.
    pub fn auto_registered(agent_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let agent_id = agent_id.into();
        Self {
            name: format!("{}{}", AUTO_REGISTERED_PREFIX, agent_id),
            agent_id,
            description: String::new(),
            trust_level: TrustLevel::Low,
            allowed_tools: Vec::new(),
            denied_tools: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
            status: AgentStatus::Active,
            registered_at: Some(now),
            updated_at: Some(now),
            auto_registered: true,
            suspended_at: None,
            suspension_reason: None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == AgentStatus::Suspended
    }

    /// True when the agent layer places no restriction on tools at all.
    pub fn is_unrestricted(&self) -> bool {
        self.denied_tools.is_empty() && allows_everything(&self.allowed_tools)
    }
}

/// `[]` and `["*"]` both mean "every tool".
pub(crate) fn allows_everything(allowed_tools: &[String]) -> bool {
    allowed_tools.is_empty() || (allowed_tools.len() == 1 && allowed_tools[0] == "*")
}

/// Input to `AgentDirectory::register`, already parsed from the wire.
///
/// `trust_level` stays a string here so the directory owns the
/// InvalidTrustLevel decision.
#[derive(Debug, Clone)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub name: String,
    pub description: String,
    pub trust_level: String,
    pub allowed_tools: Vec<String>,
    pub denied_tools: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub agent: Agent,
    /// True when an existing record was overwritten.
    pub is_update: bool,
    /// Non-blocking observations about the registration.
    pub warnings: Vec<String>,
}

/// The agent directory, backed by the `agents` collection.
#[derive(Clone)]
pub struct AgentDirectory {
    store: SharedStore,
}

impl AgentDirectory {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Load every agent, keyed by id.
    pub fn list(&self) -> Result<BTreeMap<String, Agent>, PolicyError> {
        let mut agents: BTreeMap<String, Agent> =
            load_or_default(self.store.as_ref(), Collection::Agents)?;
        // Hand-written records sometimes omit the id inside the value.
        for (id, agent) in agents.iter_mut() {
            if agent.agent_id.is_empty() {
                agent.agent_id = id.clone();
            }
        }
        Ok(agents)
    }

    /// Look up one agent.
    pub fn get(&self, agent_id: &str) -> Result<Option<Agent>, PolicyError> {
        Ok(self.list()?.remove(agent_id))
    }

    /// Return the stored agent, or create, persist and return a low-trust one.
    ///
    /// The boolean is `true` when the agent already existed. This is a write
    /// operation for unknown ids.
    pub fn resolve_or_create(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Agent, bool), PolicyError> {
        let mut agents = self.list()?;
        if let Some(agent) = agents.get(agent_id) {
            return Ok((agent.clone(), true));
        }

        let agent = Agent::auto_registered(agent_id, now);
        agents.insert(agent_id.to_string(), agent.clone());
        self.save_all(&agents)?;
        tracing::info!(agent_id, "auto-registered unknown agent with low trust");
        Ok((agent, false))
    }

    /// Create or overwrite an agent record.
    ///
    /// Fails with `InvalidTrustLevel` before anything is read or written if
    /// the trust level is not one of the four known levels.
    pub fn register(
        &self,
        registration: AgentRegistration,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, PolicyError> {
        let trust_level: TrustLevel = registration.trust_level.parse()?;

        let mut agents = self.list()?;
        let previous = agents.get(&registration.agent_id);
        let is_update = previous.is_some();
        let registered_at = previous.and_then(|a| a.registered_at).unwrap_or(now);

        let agent = Agent {
            agent_id: registration.agent_id.clone(),
            name: registration.name,
            description: registration.description,
            trust_level,
            allowed_tools: registration.allowed_tools,
            denied_tools: registration.denied_tools,
            metadata: registration.metadata,
            status: AgentStatus::Active,
            registered_at: Some(registered_at),
            updated_at: Some(now),
            auto_registered: false,
            suspended_at: None,
            suspension_reason: None,
        };

        let mut warnings = Vec::new();
        if trust_level == TrustLevel::Admin {
            warnings.push("Agent registered with ADMIN trust level - has full access".to_string());
        }
        if agent.allowed_tools.is_empty() && agent.denied_tools.is_empty() {
            warnings.push(
                "No tool restrictions defined - agent can use any tool per policies".to_string(),
            );
        }

        agents.insert(registration.agent_id, agent.clone());
        self.save_all(&agents)?;

        tracing::info!(
            agent_id = %agent.agent_id,
            trust_level = %trust_level,
            is_update,
            "agent registered"
        );
        Ok(RegistrationOutcome {
            agent,
            is_update,
            warnings,
        })
    }

    /// Suspend an agent. Returns `false` if the agent is unknown.
    ///
    /// Idempotent: suspending again overwrites the reason and timestamp.
    pub fn suspend(
        &self,
        agent_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, PolicyError> {
        let mut agents = self.list()?;
        let Some(agent) = agents.get_mut(agent_id) else {
            return Ok(false);
        };
        agent.status = AgentStatus::Suspended;
        agent.suspended_at = Some(now);
        agent.suspension_reason = Some(reason.to_string());
        self.save_all(&agents)?;

        tracing::warn!(agent_id, reason, "agent suspended");
        Ok(true)
    }

    fn save_all(&self, agents: &BTreeMap<String, Agent>) -> Result<(), PolicyError> {
        save(self.store.as_ref(), Collection::Agents, agents)?;
        Ok(())
    }
}
