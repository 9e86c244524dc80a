//! # pg-store
//!
//! Document storage for PolicyGuard.
//!
//! All PolicyGuard state lives in four named [`Collection`]s: the agent
//! directory, the policy set, the audit log, and the incident log. The
//! [`CollectionStore`] trait is the only thing the policy engine knows about
//! persistence: whole-collection read, whole-collection write, and a
//! bounded append that drops the oldest items on overflow.
//!
//! Two backends ship here:
//!
//! - [`JsonFileStore`]: one pretty-printed JSON file per collection inside a
//!   data directory that the caller passes in explicitly.
//! - [`MemoryStore`]: a mutex-guarded map, for tests.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use pg_store::{Collection, CollectionStore, JsonFileStore};
//!
//! let store = JsonFileStore::new("/tmp/policyguard").unwrap();
//! store
//!     .append(Collection::AuditLog, &serde_json::json!({"entry_id": "aud_1"}), 1000)
//!     .unwrap();
//! ```

pub mod collection;
pub mod error;
pub mod file;
pub mod memory;

pub use collection::{load_or_default, save, Collection, CollectionStore, SharedStore};
pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;
