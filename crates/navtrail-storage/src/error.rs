//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Collection '{collection}' has no index named '{index}'")]
    MissingIndex { collection: String, index: String },

    #[error("Record in '{collection}' has no usable key at '{key_path}'")]
    InvalidKey {
        collection: String,
        key_path: String,
    },

    #[error("Database already holds store '{existing}', cannot open '{requested}' in it")]
    ForeignStore { existing: String, requested: String },

    #[error("Store '{name}' is at version {stored}, cannot open at older version {requested}")]
    VersionDowngrade {
        name: String,
        stored: u32,
        requested: u32,
    },
}
