// query.rs — Filtering and paging over the audit log.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::entry::AuditEntry;

/// Default page size for audit queries.
pub const DEFAULT_LIMIT: usize = 100;

/// Parse `<n>m`, `<n>h` or `<n>d` into a duration.
///
/// Returns `None` for empty or unparseable input, which callers treat as
/// "no time filter".
pub fn parse_time_range(range: &str) -> Option<Duration> {
    let range = range.trim().to_lowercase();
    let (unit_at, unit) = range.char_indices().last()?;
    let amount: i64 = range[..unit_at].parse().ok()?;
    match unit {
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}

/// Filters for `query`. Empty strings mean "no filter".
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub agent_id: String,
    pub action_type: String,
    pub time_range: String,
    /// `allowed`, `denied`, or empty.
    pub status: String,
    pub limit: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            action_type: String::new(),
            time_range: "24h".to_string(),
            status: String::new(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl AuditQuery {
    fn admits(&self, entry: &AuditEntry, cutoff: Option<DateTime<Utc>>) -> bool {
        if !self.agent_id.is_empty() && entry.agent_id != self.agent_id {
            return false;
        }
        if !self.action_type.is_empty() && entry.action.action_type != self.action_type {
            return false;
        }
        if let Some(cutoff) = cutoff {
            if entry.timestamp < cutoff {
                return false;
            }
        }
        match self.status.as_str() {
            "denied" => !entry.is_allowed(),
            "allowed" => entry.is_allowed(),
            _ => true,
        }
    }

    fn filters_applied(&self) -> Vec<String> {
        let mut filters = Vec::new();
        if !self.agent_id.is_empty() {
            filters.push(format!("agent_id={}", self.agent_id));
        }
        if !self.action_type.is_empty() {
            filters.push(format!("action_type={}", self.action_type));
        }
        if !self.status.is_empty() {
            filters.push(format!("status={}", self.status));
        }
        if filters.is_empty() {
            filters.push("none".to_string());
        }
        filters
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    /// Matching entries, most recent first, at most `limit` of them.
    pub entries: Vec<AuditEntry>,
    pub count: usize,
    /// Number of matches before the limit was applied.
    pub total: usize,
    pub time_range: String,
    pub filters_applied: Vec<String>,
}

/// Filter `entries`, newest first, and cut to the query's limit.
pub fn query(entries: Vec<AuditEntry>, q: &AuditQuery, now: DateTime<Utc>) -> AuditPage {
    // A window reaching past the representable range filters nothing.
    let cutoff = parse_time_range(&q.time_range).and_then(|d| now.checked_sub_signed(d));

    let mut matched: Vec<AuditEntry> = entries
        .into_iter()
        .filter(|e| q.admits(e, cutoff))
        .collect();
    // Stable: entries sharing a timestamp stay in reverse insertion order.
    matched.reverse();
    matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let total = matched.len();
    matched.truncate(q.limit);
    AuditPage {
        count: matched.len(),
        entries: matched,
        total,
        time_range: q.time_range.clone(),
        filters_applied: q.filters_applied(),
    }
}
