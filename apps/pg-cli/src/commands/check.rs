// check.rs — Validate one action from the command line.
//
// Goes through the same Guardian path as the `validate_action` tool, so the
// decision is audited (and auto-registration applies) exactly as it would be
// for an agent.

use pg_gateway::{GuardConfig, Guardian, ValidateActionParams};

pub fn execute(
    config: &GuardConfig,
    agent: &str,
    target: &str,
    action_type: &str,
    parameters: &str,
    context: &str,
) -> anyhow::Result<()> {
    let guardian = Guardian::new(config.clone())?;
    let response = guardian.validate_action(ValidateActionParams {
        action_type: action_type.to_string(),
        target: target.to_string(),
        agent_id: agent.to_string(),
        parameters: parameters.to_string(),
        context: context.to_string(),
    });

    let verdict = if response.allowed {
        "ALLOW"
    } else if response.require_approval {
        "REQUIRE APPROVAL"
    } else {
        "DENY"
    };
    println!("{} {} -> {}", verdict, agent, target);
    println!("  action_id: {}", response.action_id);
    println!("  reason:    {}", response.reason);
    for warning in &response.warnings {
        println!("  warning:   {}", warning);
    }

    if !response.allowed {
        std::process::exit(if response.require_approval { 3 } else { 2 });
    }
    Ok(())
}
