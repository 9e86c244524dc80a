// error.rs — Error types for the policy subsystem.

use thiserror::Error;

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// An agent registration named a trust level outside the fixed set.
    #[error("Invalid trust level '{value}'. Must be one of: low, medium, high, admin")]
    InvalidTrustLevel { value: String },

    /// A policy or its rules failed validation. Nothing was persisted.
    #[error("Invalid policy rules: {0}")]
    InvalidPolicy(String),

    /// The underlying store could not be read or written.
    #[error("storage failure: {0}")]
    Storage(#[from] pg_store::StoreError),
}
