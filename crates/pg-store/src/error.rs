// error.rs — Error types for the storage layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing a collection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A collection document could not be parsed or rendered as JSON.
    #[error("malformed '{collection}' collection: {source}")]
    Malformed {
        collection: String,
        source: serde_json::Error,
    },

    /// The in-memory backend's lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}
