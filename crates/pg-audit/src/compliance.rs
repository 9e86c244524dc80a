// compliance.rs — Compliance and security-posture reporting.
//
// A report summarizes one time window: how many actions were allowed and
// denied, who is being denied most, what the incident picture looks like,
// and whether the policy set is doing anything at all. Overall health is a
// function of the denial rate alone.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use pg_policy::{Agent, Policy, TrustLevel};

use crate::entry::AuditEntry;
use crate::incident::{Incident, Severity};

/// Denial rate (percent) above which the posture is `critical`.
pub const CRITICAL_DENIAL_RATE: f64 = 20.0;
/// Denial rate (percent) above which the posture is `warning`.
pub const WARNING_DENIAL_RATE: f64 = 10.0;

const TOP_OFFENDERS: usize = 5;
const RECENT_INCIDENTS: usize = 10;

/// Report windows. Anything unrecognised falls back to 24 hours.
pub fn window_hours(range: &str) -> i64 {
    match range {
        "1h" => 1,
        "7d" => 168,
        "30d" => 720,
        _ => 24,
    }
}

/// Overall posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_denial_rate(rate: f64) -> Self {
        if rate > CRITICAL_DENIAL_RATE {
            HealthStatus::Critical
        } else if rate > WARNING_DENIAL_RATE {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            HealthStatus::Critical => {
                "High denial rate indicates potential security issues or misconfigured policies"
            }
            HealthStatus::Warning => "Elevated denial rate - review agent configurations",
            HealthStatus::Healthy => "Security posture is within acceptable parameters",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub allowed: usize,
    pub denied: usize,
}

impl ActionCounts {
    fn count(&mut self, allowed: bool) {
        if allowed {
            self.allowed += 1;
        } else {
            self.denied += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offender {
    pub agent_id: String,
    pub violations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceMetrics {
    pub total_actions: usize,
    pub allowed_actions: usize,
    pub denied_actions: usize,
    /// Percentage, rounded to two decimals.
    pub denial_rate: f64,
    pub top_offenders: Vec<Offender>,
    pub action_breakdown: BTreeMap<String, ActionCounts>,
    pub unique_agents: usize,
}

impl ComplianceMetrics {
    fn from_entries<'a>(entries: impl Iterator<Item = &'a AuditEntry>) -> Self {
        let mut totals = ActionCounts::default();
        let mut per_agent: BTreeMap<&str, ActionCounts> = BTreeMap::new();
        let mut action_breakdown: BTreeMap<String, ActionCounts> = BTreeMap::new();

        for entry in entries {
            let allowed = entry.is_allowed();
            totals.count(allowed);
            per_agent.entry(entry.agent_id.as_str()).or_default().count(allowed);
            let kind = if entry.action.action_type.is_empty() {
                "unknown"
            } else {
                entry.action.action_type.as_str()
            };
            action_breakdown
                .entry(kind.to_string())
                .or_default()
                .count(allowed);
        }

        let mut top_offenders: Vec<Offender> = per_agent
            .iter()
            .filter(|(_, c)| c.denied > 0)
            .map(|(id, c)| Offender {
                agent_id: id.to_string(),
                violations: c.denied,
            })
            .collect();
        top_offenders.sort_by(|a, b| b.violations.cmp(&a.violations));
        top_offenders.truncate(TOP_OFFENDERS);

        let total = totals.allowed + totals.denied;
        let denial_rate = if total == 0 {
            0.0
        } else {
            (totals.denied as f64 / total as f64 * 10_000.0).round() / 100.0
        };

        Self {
            total_actions: total,
            allowed_actions: totals.allowed,
            denied_actions: totals.denied,
            denial_rate,
            top_offenders,
            action_breakdown,
            unique_agents: per_agent.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentSummary {
    pub total: usize,
    pub by_severity: SeverityCounts,
    /// Most recent first.
    pub recent: Vec<Incident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyListing {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub rules_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub list: Vec<PolicyListing>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrustCounts {
    pub admin: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    pub total: usize,
    pub by_trust_level: TrustCounts,
    pub suspended: usize,
}

/// Which optional sections to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub include_incidents: bool,
    pub include_policy_summary: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_incidents: true,
            include_policy_summary: true,
        }
    }
}

/// A complete compliance report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub status: HealthStatus,
    pub status_message: String,
    pub time_range: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: ComplianceMetrics,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incidents: Option<IncidentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<PolicySummary>,
    pub agents: AgentSummary,
}

impl ComplianceReport {
    pub fn build<'a>(
        entries: &[AuditEntry],
        incidents: &[Incident],
        policies: &[Policy],
        agents: impl IntoIterator<Item = &'a Agent>,
        time_range: &str,
        options: ReportOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = now - Duration::hours(window_hours(time_range));

        let metrics =
            ComplianceMetrics::from_entries(entries.iter().filter(|e| e.timestamp >= cutoff));
        let status = HealthStatus::from_denial_rate(metrics.denial_rate);

        let enabled_policies = policies.iter().filter(|p| p.enabled).count();
        let mut recommendations = Vec::new();
        if let Some(top) = metrics.top_offenders.first() {
            recommendations.push(format!(
                "Review agent '{}' - {} violations",
                top.agent_id, top.violations
            ));
        }
        if policies.is_empty() {
            recommendations.push(
                "No security policies defined - create policies using create_policy tool"
                    .to_string(),
            );
        }
        if enabled_policies == 0 {
            recommendations
                .push("No policies are enabled - enable policies to enforce security".to_string());
        }

        let incidents = options
            .include_incidents
            .then(|| summarize_incidents(incidents, cutoff));

        let policies = options.include_policy_summary.then(|| PolicySummary {
            total: policies.len(),
            enabled: enabled_policies,
            disabled: policies.len() - enabled_policies,
            list: policies
                .iter()
                .map(|p| PolicyListing {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    enabled: p.enabled,
                    rules_count: p.rules.len(),
                })
                .collect(),
        });

        let mut agent_summary = AgentSummary {
            total: 0,
            by_trust_level: TrustCounts::default(),
            suspended: 0,
        };
        for agent in agents {
            agent_summary.total += 1;
            let counts = &mut agent_summary.by_trust_level;
            match agent.trust_level {
                TrustLevel::Admin => counts.admin += 1,
                TrustLevel::High => counts.high += 1,
                TrustLevel::Medium => counts.medium += 1,
                TrustLevel::Low => counts.low += 1,
            }
            if agent.is_suspended() {
                agent_summary.suspended += 1;
            }
        }

        Self {
            status,
            status_message: status.message().to_string(),
            time_range: time_range.to_string(),
            generated_at: now,
            metrics,
            recommendations,
            incidents,
            policies,
            agents: agent_summary,
        }
    }
}

fn summarize_incidents(incidents: &[Incident], cutoff: DateTime<Utc>) -> IncidentSummary {
    let mut recent: Vec<Incident> = incidents
        .iter()
        .filter(|i| i.timestamp >= cutoff)
        .cloned()
        .collect();
    recent.reverse();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut by_severity = SeverityCounts::default();
    for incident in &recent {
        match incident.severity {
            Severity::Critical => by_severity.critical += 1,
            Severity::High => by_severity.high += 1,
            Severity::Medium => by_severity.medium += 1,
            Severity::Low => by_severity.low += 1,
        }
    }

    let total = recent.len();
    recent.truncate(RECENT_INCIDENTS);
    IncidentSummary {
        total,
        by_severity,
        recent,
    }
}
