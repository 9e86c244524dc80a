// file.rs — JsonFileStore: one JSON file per collection.
//
// Layout: `<data_dir>/agents.json`, `<data_dir>/policies.json`,
// `<data_dir>/audit_log.json`, `<data_dir>/incidents.json`. Files are
// pretty-printed so an operator can inspect them by hand. The data directory
// is created on construction and again before each write, in case it was
// removed underneath a running server.

use std::fs;
use std::path::{Path, PathBuf};

use crate::collection::{Collection, CollectionStore};
use crate::error::StoreError;

/// File-backed collection store rooted at an explicit data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| StoreError::IoError {
            path: data_dir.clone(),
            source,
        })?;
        Ok(Self { data_dir })
    }

    /// The directory holding the collection files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the JSON file for a given collection.
    pub fn collection_file(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }
}

impl CollectionStore for JsonFileStore {
    fn read(&self, collection: Collection) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.collection_file(collection);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| StoreError::IoError {
            path: path.clone(),
            source,
        })?;
        if json.trim().is_empty() {
            return Ok(None);
        }
        let document = serde_json::from_str(&json).map_err(|source| StoreError::Malformed {
            collection: collection.name().to_string(),
            source,
        })?;
        Ok(Some(document))
    }

    fn write(&self, collection: Collection, document: &serde_json::Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::IoError {
            path: self.data_dir.clone(),
            source,
        })?;
        let path = self.collection_file(collection);
        let json = serde_json::to_string_pretty(document).map_err(|source| StoreError::Malformed {
            collection: collection.name().to_string(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| StoreError::IoError { path, source })?;
        tracing::trace!(collection = collection.name(), "collection written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data")).unwrap();

        let doc = json!({ "agent-1": { "trust_level": "high" } });
        store.write(Collection::Agents, &doc).unwrap();

        assert_eq!(store.read(Collection::Agents).unwrap(), Some(doc));
        assert!(dir.path().join("data/agents.json").exists());
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert!(store.read(Collection::Policies).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        fs::write(store.collection_file(Collection::Policies), "[{ not json").unwrap();

        let result = store.read(Collection::Policies);
        assert!(matches!(result, Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn append_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = JsonFileStore::new(dir.path()).unwrap();
            store.append(Collection::AuditLog, &json!({ "n": 1 }), 10).unwrap();
        }
        {
            let store = JsonFileStore::new(dir.path()).unwrap();
            store.append(Collection::AuditLog, &json!({ "n": 2 }), 10).unwrap();
            let items = store.read(Collection::AuditLog).unwrap().unwrap();
            assert_eq!(items.as_array().unwrap().len(), 2);
        }
    }

    #[test]
    fn write_recreates_removed_data_dir() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = JsonFileStore::new(&data_dir).unwrap();
        fs::remove_dir_all(&data_dir).unwrap();

        store.write(Collection::Incidents, &json!([])).unwrap();
        assert!(data_dir.join("incidents.json").exists());
    }
}
