// policy.rs — Policy subcommands: list, apply.

use std::path::PathBuf;

use clap::Subcommand;
use pg_gateway::{load_policy_bundle, GuardConfig, Guardian};

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// List policies in evaluation order.
    List,
    /// Create or replace policies from a YAML bundle.
    Apply {
        /// YAML file with a policy, a list of policies, or `policies:`.
        #[arg(long)]
        file: PathBuf,
    },
}

pub fn execute(cmd: &PolicyCommands, config: &GuardConfig) -> anyhow::Result<()> {
    let guardian = Guardian::new(config.clone())?;
    match cmd {
        PolicyCommands::List => {
            let policies = guardian.engine().policies().list()?;
            if policies.is_empty() {
                println!("No policies.");
                return Ok(());
            }
            println!(
                "{:<24} {:>8} {:<8} {:>5} NAME",
                "POLICY", "PRIORITY", "ENABLED", "RULES"
            );
            for policy in &policies {
                println!(
                    "{:<24} {:>8} {:<8} {:>5} {}",
                    policy.id,
                    policy.priority,
                    if policy.enabled { "yes" } else { "no" },
                    policy.rules.len(),
                    policy.name
                );
            }
        }

        PolicyCommands::Apply { file } => {
            let definitions = load_policy_bundle(file)?;
            let mut failed = 0;
            for definition in definitions {
                let response = guardian.apply_policy(definition);
                let mark = if response.success { "ok" } else { "FAILED" };
                println!("[{}] {}", mark, response.message);
                for warning in &response.warnings {
                    println!("     warning: {}", warning);
                }
                if !response.success {
                    failed += 1;
                }
            }
            if failed > 0 {
                anyhow::bail!("{} polic(ies) in {} were rejected", failed, file.display());
            }
        }
    }
    Ok(())
}
