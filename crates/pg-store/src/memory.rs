// memory.rs — In-memory CollectionStore for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::collection::{Collection, CollectionStore};
use crate::error::StoreError;

/// Collection store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<Collection, serde_json::Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionStore for MemoryStore {
    fn read(&self, collection: Collection) -> Result<Option<serde_json::Value>, StoreError> {
        let documents = self
            .documents
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(documents.get(&collection).cloned())
    }

    fn write(&self, collection: Collection, document: &serde_json::Value) -> Result<(), StoreError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        documents.insert(collection, document.clone());
        Ok(())
    }
}
