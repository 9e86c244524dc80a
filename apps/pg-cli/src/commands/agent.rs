// agent.rs — Agent subcommands: list.

use clap::Subcommand;
use pg_gateway::{GuardConfig, Guardian};

#[derive(Subcommand)]
pub enum AgentCommands {
    /// List registered agents.
    List {
        /// Only show suspended agents.
        #[arg(long)]
        suspended: bool,
    },
}

pub fn execute(cmd: &AgentCommands, config: &GuardConfig) -> anyhow::Result<()> {
    let guardian = Guardian::new(config.clone())?;
    match cmd {
        AgentCommands::List { suspended } => {
            let agents = guardian.engine().agents().list()?;
            let shown: Vec<_> = agents
                .values()
                .filter(|a| !*suspended || a.is_suspended())
                .collect();

            if shown.is_empty() {
                println!("No agents.");
                return Ok(());
            }

            println!(
                "{:<24} {:<8} {:<10} {:<6} NAME",
                "AGENT", "TRUST", "STATUS", "AUTO"
            );
            for agent in shown {
                println!(
                    "{:<24} {:<8} {:<10} {:<6} {}",
                    agent.agent_id,
                    agent.trust_level.as_str(),
                    agent.status.to_string(),
                    if agent.auto_registered { "yes" } else { "" },
                    agent.name
                );
                if let Some(reason) = &agent.suspension_reason {
                    println!("    suspended: {}", reason);
                }
            }
        }
    }
    Ok(())
}
