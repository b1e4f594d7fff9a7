//! Physical layout and schema upgrades
//!
//! Every store lives in four fixed tables: `store_meta` (name + version),
//! `collections` (catalog), `records` (documents) and `index_entries`.
//! A database file holds exactly one store; opening a store under a different
//! name is refused. A version change drops every record and rewrites the
//! catalog in one transaction.

use rusqlite::{Connection, OptionalExtension};

use crate::error::StorageError;
use crate::schema::StoreSchema;
use crate::Result;

const BASE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS store_meta (
        name TEXT PRIMARY KEY,
        version INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        key_path TEXT NOT NULL,
        indices TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (collection, key)
    );

    CREATE TABLE IF NOT EXISTS index_entries (
        collection TEXT NOT NULL,
        index_name TEXT NOT NULL,
        value TEXT NOT NULL,
        key TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_index_entries_lookup
        ON index_entries(collection, index_name, value);
    CREATE INDEX IF NOT EXISTS idx_index_entries_key
        ON index_entries(collection, key);
"#;

/// Bring the physical tables in line with `schema`.
///
/// Returns true when the collections were (re)created.
pub fn run_migrations(conn: &Connection, schema: &StoreSchema) -> Result<bool> {
    conn.execute_batch(BASE_TABLES)?;

    let existing: Option<String> = conn
        .query_row(
            "SELECT name FROM store_meta WHERE name != ?1 LIMIT 1",
            [&schema.name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(existing) = existing {
        return Err(StorageError::ForeignStore {
            existing,
            requested: schema.name.clone(),
        });
    }

    let current_version = get_schema_version(conn, &schema.name)?;

    match current_version {
        Some(stored) if stored == schema.version => Ok(false),
        Some(stored) if stored > schema.version => Err(StorageError::VersionDowngrade {
            name: schema.name.clone(),
            stored,
            requested: schema.version,
        }),
        previous => {
            tracing::info!(
                store = %schema.name,
                from = ?previous,
                to = schema.version,
                "Recreating collections for new schema version"
            );
            recreate_collections(conn, schema)?;
            set_schema_version(conn, &schema.name, schema.version)?;
            Ok(true)
        }
    }
}

fn get_schema_version(conn: &Connection, name: &str) -> Result<Option<u32>> {
    let version = conn
        .query_row(
            "SELECT version FROM store_meta WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, name: &str, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO store_meta (name, version) VALUES (?1, ?2)",
        rusqlite::params![name, version],
    )?;
    Ok(())
}

fn recreate_collections(conn: &Connection, schema: &StoreSchema) -> Result<()> {
    conn.execute("DELETE FROM index_entries", [])?;
    conn.execute("DELETE FROM records", [])?;
    conn.execute("DELETE FROM collections", [])?;

    for collection in &schema.collections {
        let indices = serde_json::to_string(&collection.indices)?;
        conn.execute(
            "INSERT INTO collections (name, key_path, indices) VALUES (?1, ?2, ?3)",
            rusqlite::params![collection.name, collection.key_path, indices],
        )?;
        tracing::debug!(
            collection = %collection.name,
            indices = collection.indices.len(),
            "Created collection"
        );
    }

    Ok(())
}
