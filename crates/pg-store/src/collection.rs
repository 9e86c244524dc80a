// collection.rs — Collection names and the CollectionStore trait.
//
// A collection is a single JSON document: the agent directory is an object
// keyed by agent id, the other three are arrays. Backends deal only in
// `serde_json::Value`; the typed helpers at the bottom of this file turn
// documents into domain types for callers.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// The logical collections PolicyGuard persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Registered agents, keyed by agent id.
    Agents,
    /// Policies in descending priority order.
    Policies,
    /// Append-only audit entries, oldest first.
    AuditLog,
    /// Append-only incident records, oldest first.
    Incidents,
}

impl Collection {
    /// Every collection, in a stable order.
    pub const ALL: [Collection; 4] = [
        Collection::Agents,
        Collection::Policies,
        Collection::AuditLog,
        Collection::Incidents,
    ];

    /// Stable short name, used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Agents => "agents",
            Collection::Policies => "policies",
            Collection::AuditLog => "audit_log",
            Collection::Incidents => "incidents",
        }
    }

    /// File name used by file-backed stores.
    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Agents => "agents.json",
            Collection::Policies => "policies.json",
            Collection::AuditLog => "audit_log.json",
            Collection::Incidents => "incidents.json",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage backend for PolicyGuard collections.
///
/// Implementations provide no isolation between concurrent writers: every
/// mutation is a read-modify-write of a whole document. Callers that need
/// serialization must hold their own lock around a request.
pub trait CollectionStore: Send + Sync {
    /// Read a whole collection. `Ok(None)` means it has never been written.
    fn read(&self, collection: Collection) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replace a whole collection.
    fn write(&self, collection: Collection, document: &serde_json::Value) -> Result<(), StoreError>;

    /// Append one item to an array collection, keeping at most `max_items`
    /// (oldest dropped first). A missing or non-array document is treated as
    /// an empty array.
    fn append(
        &self,
        collection: Collection,
        item: &serde_json::Value,
        max_items: usize,
    ) -> Result<(), StoreError> {
        let mut items = match self.read(collection)? {
            Some(serde_json::Value::Array(items)) => items,
            Some(other) => {
                tracing::warn!(
                    collection = collection.name(),
                    kind = json_kind(&other),
                    "collection is not an array, resetting before append"
                );
                Vec::new()
            }
            None => Vec::new(),
        };
        items.push(item.clone());
        if items.len() > max_items {
            let overflow = items.len() - max_items;
            items.drain(..overflow);
        }
        self.write(collection, &serde_json::Value::Array(items))
    }
}

/// A store shared between the directory, the policy store and the recorder.
pub type SharedStore = Arc<dyn CollectionStore>;

/// Read a collection as `T`, or `T::default()` if it has never been written.
pub fn load_or_default<T>(store: &dyn CollectionStore, collection: Collection) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    match store.read(collection)? {
        Some(document) => serde_json::from_value(document).map_err(|source| StoreError::Malformed {
            collection: collection.name().to_string(),
            source,
        }),
        None => Ok(T::default()),
    }
}

/// Serialize `value` and replace the collection with it.
pub fn save<T>(store: &dyn CollectionStore, collection: Collection, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let document = serde_json::to_value(value).map_err(|source| StoreError::Malformed {
        collection: collection.name().to_string(),
        source,
    })?;
    store.write(collection, &document)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
