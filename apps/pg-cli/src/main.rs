//! # pg-cli
//!
//! Command-line interface for PolicyGuard.
//!
//! - `policyguard serve`: start the MCP server on stdio
//! - `policyguard check`: validate one action from the shell
//! - `policyguard agent list`: show registered agents
//! - `policyguard policy list/apply`: inspect policies, load YAML bundles
//! - `policyguard audit tail/query`: read the audit trail
//! - `policyguard compliance`: print the compliance report

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pg_gateway::GuardConfig;
use tracing_subscriber::EnvFilter;

/// PolicyGuard: policy decisions and audit for AI agents.
#[derive(Parser)]
#[command(name = "policyguard", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Data directory override (defaults to <project-root>/.policyguard).
    #[arg(long, env = "POLICYGUARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdio.
    Serve,
    /// Validate a single action and print the decision.
    Check {
        /// Agent requesting the action.
        #[arg(long)]
        agent: String,
        /// Tool or resource the action targets.
        #[arg(long)]
        target: String,
        /// Declared action type.
        #[arg(long, default_value = "tool_call")]
        action_type: String,
        /// Tool parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        parameters: String,
        /// Free-text context.
        #[arg(long, default_value = "")]
        context: String,
    },
    /// Inspect registered agents.
    Agent {
        #[command(subcommand)]
        command: commands::agent::AgentCommands,
    },
    /// Inspect and load policies.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
    /// Print the compliance report.
    Compliance {
        /// Report window: 1h, 24h, 7d or 30d.
        #[arg(long, default_value = "24h")]
        time_range: String,
        /// Leave out the incident summary.
        #[arg(long)]
        no_incidents: bool,
        /// Leave out the policy summary.
        #[arg(long)]
        no_policies: bool,
    },
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    // stdout carries MCP traffic under `serve`; logs go to stderr.
    let filter = EnvFilter::from_default_env()
        .add_directive("pg_gateway=info".parse()?)
        .add_directive("pg_cli=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let mut config = GuardConfig::load(&project_root)?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match &cli.command {
        Commands::Serve => commands::serve::execute(config),
        Commands::Check {
            agent,
            target,
            action_type,
            parameters,
            context,
        } => commands::check::execute(&config, agent, target, action_type, parameters, context),
        Commands::Agent { command } => commands::agent::execute(command, &config),
        Commands::Policy { command } => commands::policy::execute(command, &config),
        Commands::Audit { command } => commands::audit::execute(command, &config),
        Commands::Compliance {
            time_range,
            no_incidents,
            no_policies,
        } => commands::compliance::execute(&config, time_range, !*no_incidents, !*no_policies),
    }
}
