// audit.rs — Audit subcommands: tail, query.

use clap::Subcommand;
use pg_audit::{AuditEntry, DEFAULT_LIMIT};
use pg_gateway::{AuditLogParams, GuardConfig, Guardian};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show the most recent audit entries.
    Tail {
        /// Number of entries to show.
        #[arg(short = 'n', default_value_t = 10)]
        count: usize,
    },
    /// Filter the audit log.
    Query {
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        action_type: Option<String>,
        /// Window such as 30m, 24h or 7d.
        #[arg(long, default_value = "24h")]
        time_range: String,
        /// `allowed` or `denied`.
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(cmd: &AuditCommands, config: &GuardConfig) -> anyhow::Result<()> {
    let guardian = Guardian::new(config.clone())?;
    match cmd {
        AuditCommands::Tail { count } => {
            let entries = guardian.recorder().entries()?;
            if entries.is_empty() {
                println!("No audit entries.");
                return Ok(());
            }
            let start = entries.len().saturating_sub(*count);
            for entry in &entries[start..] {
                print_entry(entry);
            }
        }

        AuditCommands::Query {
            agent,
            action_type,
            time_range,
            status,
            limit,
            json,
        } => {
            let page = guardian.get_audit_log(AuditLogParams {
                agent_id: agent.clone().unwrap_or_default(),
                action_type: action_type.clone().unwrap_or_default(),
                time_range: time_range.clone(),
                status: status.clone().unwrap_or_default(),
                limit: *limit,
            })?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&page)?);
                return Ok(());
            }

            println!(
                "{} of {} entries in the last {} (filters: {})",
                page.count,
                page.total,
                page.time_range,
                page.filters_applied.join(", ")
            );
            for entry in &page.entries {
                print_entry(entry);
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &AuditEntry) {
    let verdict = if entry.evaluation.allowed {
        "allow"
    } else if entry.evaluation.require_approval {
        "approve"
    } else {
        "deny"
    };
    println!(
        "{} {:<7} {:<20} {:<20} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        verdict,
        entry.agent_id,
        entry.action.action_type,
        entry.action.target
    );
    if !entry.evaluation.allowed {
        println!("    {}", entry.evaluation.reason);
    }
}
