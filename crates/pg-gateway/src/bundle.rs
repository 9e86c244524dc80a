// bundle.rs — Policy bundles loaded from YAML.
//
// A bundle file holds one or more policy definitions, either as a bare list,
// under a top-level `policies:` key, or as a single policy document. Each
// definition is applied through the same upsert (and audit) path as the
// `create_policy` tool.

use std::path::Path;

use serde::Deserialize;

use pg_policy::PolicyDefinition;

use crate::error::GatewayError;

#[derive(Deserialize)]
#[serde(untagged)]
enum BundleDocument {
    Wrapped { policies: Vec<PolicyDefinition> },
    List(Vec<PolicyDefinition>),
    Single(PolicyDefinition),
}

/// Parse bundle text into policy definitions, in file order.
pub fn parse_policy_bundle(text: &str) -> Result<Vec<PolicyDefinition>, serde_yaml::Error> {
    Ok(match serde_yaml::from_str::<BundleDocument>(text)? {
        BundleDocument::Wrapped { policies } => policies,
        BundleDocument::List(policies) => policies,
        BundleDocument::Single(policy) => vec![policy],
    })
}

/// Read and parse a bundle file.
pub fn load_policy_bundle(path: &Path) -> Result<Vec<PolicyDefinition>, GatewayError> {
    let text = std::fs::read_to_string(path).map_err(|e| GatewayError::PolicyBundle {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_policy_bundle(&text).map_err(|e| GatewayError::PolicyBundle {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
