//! Store registry
//!
//! Owned by the composition root. Guarantees one physical connection per
//! (store name, version), so two components opening the same store never race
//! each other through a schema upgrade.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

use crate::database::Database;
use crate::schema::StoreSchema;
use crate::store::ObjectStore;
use crate::Result;

#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<(String, u32), ObjectStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reuse) the file-backed store described by `schema`.
    pub fn open<P: AsRef<Path>>(&self, path: P, schema: StoreSchema) -> Result<ObjectStore> {
        self.get_or_open(schema, |schema| {
            ObjectStore::initialize(Database::open(path.as_ref())?, schema)
        })
    }

    /// Open (or reuse) an in-memory store described by `schema`.
    pub fn open_in_memory(&self, schema: StoreSchema) -> Result<ObjectStore> {
        self.get_or_open(schema, ObjectStore::open_in_memory)
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.lock().is_empty()
    }

    fn get_or_open<F>(&self, schema: StoreSchema, open: F) -> Result<ObjectStore>
    where
        F: FnOnce(StoreSchema) -> Result<ObjectStore>,
    {
        // Held across the open so a second caller waits for the upgrade
        let mut stores = self.stores.lock();
        let key = (schema.name.clone(), schema.version);

        if let Some(store) = stores.get(&key) {
            tracing::debug!(store = %key.0, version = key.1, "Reusing open store");
            return Ok(store.clone());
        }

        let store = open(schema)?;
        stores.insert(key, store.clone());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CollectionSchema;

    fn schema(version: u32) -> StoreSchema {
        StoreSchema::new("graph", version).collection(CollectionSchema::new("items", "id"))
    }

    #[test]
    fn test_same_name_and_version_share_connection() {
        let registry = StoreRegistry::new();
        let a = registry.open_in_memory(schema(1)).unwrap();
        let b = registry.open_in_memory(schema(1)).unwrap();
        assert!(a.database().same_connection(b.database()));
        assert_eq!(registry.len(), 1);

        let c = registry.open_in_memory(schema(2)).unwrap();
        assert!(!a.database().same_connection(c.database()));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_file_store_reopens_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let registry = StoreRegistry::new();

        let store = registry.open(&path, schema(1)).unwrap();
        store
            .put("items", &serde_json::json!({ "id": "a" }))
            .unwrap();

        let again = registry.open(&path, schema(1)).unwrap();
        assert_eq!(again.count("items").unwrap(), 1);
    }
}
