// trust.rs — Agent trust levels.
//
// Trust is a fixed total order: low < medium < high < admin, scored 1..=4.
// Registration parses strictly (`FromStr`) and rejects anything else; data
// read back from storage parses leniently (`From<String>`) so a hand-edited
// or legacy record with an unknown level is treated as `low` instead of
// poisoning the whole agent directory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PolicyError;

/// How much an agent is trusted. Variant order is the trust order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TrustLevel {
    #[default]
    Low,
    Medium,
    High,
    Admin,
}

impl TrustLevel {
    pub const ALL: [TrustLevel; 4] = [
        TrustLevel::Low,
        TrustLevel::Medium,
        TrustLevel::High,
        TrustLevel::Admin,
    ];

    /// Numeric score used by rule comparisons.
    pub fn score(self) -> u8 {
        match self {
            TrustLevel::Low => 1,
            TrustLevel::Medium => 2,
            TrustLevel::High => 3,
            TrustLevel::Admin => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::Low => "low",
            TrustLevel::Medium => "medium",
            TrustLevel::High => "high",
            TrustLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TrustLevel::Low),
            "medium" => Ok(TrustLevel::Medium),
            "high" => Ok(TrustLevel::High),
            "admin" => Ok(TrustLevel::Admin),
            other => Err(PolicyError::InvalidTrustLevel {
                value: other.to_string(),
            }),
        }
    }
}

/// Lenient conversion: unknown strings fall back to `low`.
impl From<String> for TrustLevel {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Deserialize an optional trust level where `""` and `null` both mean absent.
pub(crate) fn optional_trust<'de, D>(deserializer: D) -> Result<Option<TrustLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(TrustLevel::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_follow_declared_order() {
        let scores: Vec<u8> = TrustLevel::ALL.iter().map(|t| t.score()).collect();
        assert_eq!(scores, vec![1, 2, 3, 4]);
        assert!(TrustLevel::Low < TrustLevel::Admin);
        assert!(TrustLevel::High > TrustLevel::Medium);
    }

    #[test]
    fn strict_parse_rejects_unknown_levels() {
        assert_eq!("high".parse::<TrustLevel>().unwrap(), TrustLevel::High);
        let err = "superadmin".parse::<TrustLevel>().unwrap_err();
        assert!(err.to_string().contains("Invalid trust level 'superadmin'"));
        // Case matters on the wire.
        assert!("Admin".parse::<TrustLevel>().is_err());
    }

    #[test]
    fn stored_unknown_level_reads_as_low() {
        let level: TrustLevel = serde_json::from_str("\"root\"").unwrap();
        assert_eq!(level, TrustLevel::Low);
        let level: TrustLevel = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(level, TrustLevel::Admin);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TrustLevel::Medium).unwrap(), "\"medium\"");
    }
}
