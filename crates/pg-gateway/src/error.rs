// error.rs — Error types for the PolicyGuard gateway.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or running the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The data directory or a collection could not be accessed.
    #[error("storage error: {0}")]
    Store(#[from] pg_store::StoreError),

    /// An agent or policy operation failed.
    #[error("{0}")]
    Policy(#[from] pg_policy::PolicyError),

    /// Recording or reading audit data failed.
    #[error("audit error: {0}")]
    Audit(#[from] pg_audit::AuditError),

    /// The config file exists but could not be read.
    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML for `GuardConfig`.
    #[error("invalid config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A policy bundle file could not be read or parsed.
    #[error("invalid policy bundle at {path}: {message}")]
    PolicyBundle { path: PathBuf, message: String },
}
