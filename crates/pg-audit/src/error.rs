// error.rs — Error types for the audit subsystem.

use thiserror::Error;

/// Errors that can occur while recording or reading audit data.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit or incident collection could not be read or written.
    #[error("audit storage failure: {0}")]
    Storage(#[from] pg_store::StoreError),

    /// Suspending an agent for a critical incident failed.
    #[error("agent directory failure: {0}")]
    Directory(#[from] pg_policy::PolicyError),

    /// A record could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
