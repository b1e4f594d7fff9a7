//! NavTrail Storage Layer
//!
//! A small object store on top of SQLite: named collections of JSON
//! documents, each with a primary-key path and non-unique secondary indices.
//! Every operation runs in its own transaction.

mod database;
mod error;
mod migrations;
mod registry;
mod schema;
mod store;

pub use database::Database;
pub use error::StorageError;
pub use registry::StoreRegistry;
pub use schema::{CollectionSchema, IndexSchema, StoreSchema};
pub use store::ObjectStore;

pub type Result<T> = std::result::Result<T, StorageError>;
