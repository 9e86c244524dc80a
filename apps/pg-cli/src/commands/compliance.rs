// compliance.rs — Print the compliance report as JSON.

use pg_gateway::{ComplianceParams, GuardConfig, Guardian};

pub fn execute(
    config: &GuardConfig,
    time_range: &str,
    include_incidents: bool,
    include_policy_summary: bool,
) -> anyhow::Result<()> {
    let guardian = Guardian::new(config.clone())?;
    let report = guardian.get_compliance_status(ComplianceParams {
        time_range: time_range.to_string(),
        include_incidents,
        include_policy_summary,
    })?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
