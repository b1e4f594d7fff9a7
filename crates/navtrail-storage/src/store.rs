//! Object store operations

use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::database::Database;
use crate::error::StorageError;
use crate::migrations::run_migrations;
use crate::schema::{CollectionSchema, IndexSchema, StoreSchema};
use crate::Result;

/// Collections of JSON documents keyed by a primary-key path, with
/// secondary indices maintained on every write.
pub struct ObjectStore {
    db: Database,
    schema: Arc<StoreSchema>,
}

impl ObjectStore {
    /// Open the store on `db`, creating or recreating collections as the
    /// schema version requires.
    pub fn initialize(db: Database, schema: StoreSchema) -> Result<Self> {
        let upgraded = db.transaction(|conn| run_migrations(conn, &schema))?;

        tracing::info!(
            store = %schema.name,
            version = schema.version,
            collections = schema.collections.len(),
            upgraded,
            "Object store ready"
        );

        Ok(Self {
            db,
            schema: Arc::new(schema),
        })
    }

    pub fn open_in_memory(schema: StoreSchema) -> Result<Self> {
        Self::initialize(Database::open_in_memory()?, schema)
    }

    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert or replace a document, rewriting its index entries.
    pub fn put<T: Serialize>(&self, collection: &str, record: &T) -> Result<()> {
        let schema = self.collection(collection)?;
        let document = serde_json::to_value(record)?;
        let key = primary_key(schema, &document)?;
        let body = serde_json::to_string(&document)?;

        self.db.transaction(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO records (collection, key, value) VALUES (?1, ?2, ?3)",
                rusqlite::params![collection, key, body],
            )?;
            remove_index_entries(conn, collection, &key)?;

            for index in &schema.indices {
                for value in index_values(index, &document)? {
                    conn.execute(
                        "INSERT INTO index_entries (collection, index_name, value, key)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![collection, index.name, value, key],
                    )?;
                }
            }
            Ok(())
        })
    }

    pub fn get<T, K>(&self, collection: &str, key: &K) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        K: Serialize + ?Sized,
    {
        let schema = self.collection(collection)?;
        let key = encode_key(schema, &serde_json::to_value(key)?)?;

        let body: Option<String> = self.db.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM records WHERE collection = ?1 AND key = ?2",
                    rusqlite::params![collection, key],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        body.map(|b| serde_json::from_str(&b).map_err(StorageError::from))
            .transpose()
    }

    /// Every document in the collection, ordered by primary key.
    pub fn get_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        self.collection(collection)?;

        let bodies: Vec<String> = self.db.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT value FROM records WHERE collection = ?1 ORDER BY key")?;
            let rows = stmt
                .query_map([collection], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(rows)
        })?;

        decode_all(bodies)
    }

    /// Documents whose `index` value equals `value`.
    ///
    /// Asking for an index the collection does not declare is an error, never
    /// a silent full scan.
    pub fn get_by_index<T, V>(&self, collection: &str, index: &str, value: &V) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        V: Serialize + ?Sized,
    {
        let schema = self.collection(collection)?;
        if schema.find_index(index).is_none() {
            return Err(StorageError::MissingIndex {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }

        let value = serde_json::to_value(value)?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let encoded = serde_json::to_string(&value)?;

        let bodies: Vec<String> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT r.key, r.value FROM index_entries i
                 JOIN records r ON r.collection = i.collection AND r.key = i.key
                 WHERE i.collection = ?1 AND i.index_name = ?2 AND i.value = ?3
                 ORDER BY r.key",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![collection, index, encoded], |row| {
                    row.get(1)
                })?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(rows)
        })?;

        decode_all(bodies)
    }

    /// Remove a document. Returns whether it existed.
    pub fn delete<K: Serialize + ?Sized>(&self, collection: &str, key: &K) -> Result<bool> {
        let schema = self.collection(collection)?;
        let key = encode_key(schema, &serde_json::to_value(key)?)?;

        self.db.transaction(|conn| {
            remove_index_entries(conn, collection, &key)?;
            let removed = conn.execute(
                "DELETE FROM records WHERE collection = ?1 AND key = ?2",
                rusqlite::params![collection, key],
            )?;
            Ok(removed > 0)
        })
    }

    /// Remove every document in the collection. Returns how many were removed.
    pub fn clear(&self, collection: &str) -> Result<usize> {
        self.collection(collection)?;

        let removed = self.db.transaction(|conn| {
            conn.execute(
                "DELETE FROM index_entries WHERE collection = ?1",
                [collection],
            )?;
            Ok(conn.execute("DELETE FROM records WHERE collection = ?1", [collection])?)
        })?;

        tracing::debug!(collection = %collection, removed, "Cleared collection");
        Ok(removed)
    }

    pub fn count(&self, collection: &str) -> Result<usize> {
        self.collection(collection)?;

        self.db.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    pub fn exists<K: Serialize + ?Sized>(&self, collection: &str, key: &K) -> Result<bool> {
        let schema = self.collection(collection)?;
        let key = encode_key(schema, &serde_json::to_value(key)?)?;

        self.db.with_connection(|conn| {
            let found: Option<i32> = conn
                .query_row(
                    "SELECT 1 FROM records WHERE collection = ?1 AND key = ?2",
                    rusqlite::params![collection, key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn collection(&self, name: &str) -> Result<&CollectionSchema> {
        self.schema
            .find_collection(name)
            .ok_or_else(|| StorageError::UnknownCollection(name.to_string()))
    }
}

impl Clone for ObjectStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            schema: Arc::clone(&self.schema),
        }
    }
}

fn remove_index_entries(conn: &Connection, collection: &str, key: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM index_entries WHERE collection = ?1 AND key = ?2",
        rusqlite::params![collection, key],
    )?;
    Ok(())
}

fn decode_all<T: DeserializeOwned>(bodies: Vec<String>) -> Result<Vec<T>> {
    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(StorageError::from))
        .collect()
}

/// Resolve a dotted key path inside a document.
fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, segment| value.get(segment))
}

fn primary_key(schema: &CollectionSchema, document: &Value) -> Result<String> {
    let key = lookup(document, &schema.key_path).ok_or_else(|| StorageError::InvalidKey {
        collection: schema.name.clone(),
        key_path: schema.key_path.clone(),
    })?;
    encode_key(schema, key)
}

/// Keys are strings or numbers, stored as their JSON text.
fn encode_key(schema: &CollectionSchema, key: &Value) -> Result<String> {
    match key {
        Value::String(_) | Value::Number(_) => Ok(serde_json::to_string(key)?),
        _ => Err(StorageError::InvalidKey {
            collection: schema.name.clone(),
            key_path: schema.key_path.clone(),
        }),
    }
}

fn index_values(index: &IndexSchema, document: &Value) -> Result<BTreeSet<String>> {
    let mut values = BTreeSet::new();

    match lookup(document, &index.key_path) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) if index.multi_entry => {
            for item in items.iter().filter(|v| !v.is_null()) {
                values.insert(serde_json::to_string(item)?);
            }
        }
        Some(value) => {
            values.insert(serde_json::to_string(value)?);
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Item {
        id: String,
        kind: Option<String>,
        tags: Vec<String>,
        owner_id: i64,
    }

    fn item(id: &str, kind: Option<&str>, tags: &[&str], owner_id: i64) -> Item {
        Item {
            id: id.to_string(),
            kind: kind.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            owner_id,
        }
    }

    fn store() -> ObjectStore {
        let schema = StoreSchema::new("test", 1)
            .collection(
                CollectionSchema::new("items", "id")
                    .index(IndexSchema::new("kind"))
                    .index(IndexSchema::new("tags").multi_entry())
                    .index(IndexSchema::new("owner").with_key_path("ownerId")),
            )
            .collection(CollectionSchema::new("settings", "key"));
        ObjectStore::open_in_memory(schema).unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = store();
        let a = item("a", Some("page"), &["x"], 7);
        store.put("items", &a).unwrap();

        let loaded: Option<Item> = store.get("items", "a").unwrap();
        assert_eq!(loaded, Some(a));
        assert!(store.exists("items", "a").unwrap());
        assert!(!store.exists("items", "b").unwrap());

        let missing: Option<Item> = store.get("items", "b").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_index_lookup_tracks_updates() {
        let store = store();
        store.put("items", &item("a", Some("page"), &[], 1)).unwrap();
        store.put("items", &item("b", Some("page"), &[], 2)).unwrap();
        store.put("items", &item("c", None, &[], 1)).unwrap();

        let pages: Vec<Item> = store.get_by_index("items", "kind", "page").unwrap();
        assert_eq!(pages.len(), 2);

        // Changing the indexed field moves the record to the new bucket
        store.put("items", &item("a", Some("image"), &[], 1)).unwrap();
        let pages: Vec<Item> = store.get_by_index("items", "kind", "page").unwrap();
        assert_eq!(pages.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), ["b"]);

        let owned: Vec<Item> = store.get_by_index("items", "owner", &1).unwrap();
        assert_eq!(owned.len(), 2);
    }

    #[test]
    fn test_multi_entry_index() {
        let store = store();
        store.put("items", &item("a", None, &["red", "blue", "red"], 0)).unwrap();
        store.put("items", &item("b", None, &["blue"], 0)).unwrap();

        let blue: Vec<Item> = store.get_by_index("items", "tags", "blue").unwrap();
        assert_eq!(blue.len(), 2);
        let red: Vec<Item> = store.get_by_index("items", "tags", "red").unwrap();
        assert_eq!(red.len(), 1);
    }

    #[test]
    fn test_missing_index_is_rejected() {
        let store = store();
        let err = store
            .get_by_index::<Item, _>("items", "nope", "x")
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingIndex { .. }));

        let err = store.count("ghosts").unwrap_err();
        assert!(matches!(err, StorageError::UnknownCollection(_)));
    }

    #[test]
    fn test_delete_clear_count() {
        let store = store();
        for id in ["a", "b", "c"] {
            store.put("items", &item(id, Some("page"), &[], 0)).unwrap();
        }
        assert_eq!(store.count("items").unwrap(), 3);

        assert!(store.delete("items", "b").unwrap());
        assert!(!store.delete("items", "b").unwrap());
        assert_eq!(store.count("items").unwrap(), 2);

        let pages: Vec<Item> = store.get_by_index("items", "kind", "page").unwrap();
        assert_eq!(pages.len(), 2);

        assert_eq!(store.clear("items").unwrap(), 2);
        assert_eq!(store.count("items").unwrap(), 0);
        let pages: Vec<Item> = store.get_by_index("items", "kind", "page").unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_record_without_key_is_rejected() {
        let store = store();
        let err = store.put("settings", &json!({ "value": 1 })).unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));

        store
            .put("settings", &json!({ "key": "sessionMode", "value": "daily" }))
            .unwrap();
        let all: Vec<Value> = store.get_all("settings").unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_schema_upgrade_recreates_collections() {
        let db = Database::open_in_memory().unwrap();
        let v1 = StoreSchema::new("test", 1).collection(CollectionSchema::new("items", "id"));
        let store = ObjectStore::initialize(db.clone(), v1.clone()).unwrap();
        store.put("items", &item("a", None, &[], 0)).unwrap();

        // Same version keeps data
        let same = ObjectStore::initialize(db.clone(), v1).unwrap();
        assert_eq!(same.count("items").unwrap(), 1);

        let v2 = StoreSchema::new("test", 2)
            .collection(CollectionSchema::new("items", "id").index(IndexSchema::new("kind")));
        let upgraded = ObjectStore::initialize(db, v2).unwrap();
        assert_eq!(upgraded.count("items").unwrap(), 0);
    }
}
