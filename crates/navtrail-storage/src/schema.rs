//! Store schema description

use serde::{Deserialize, Serialize};

/// Secondary index over one field of a collection's documents.
///
/// Indices are never unique. A multi-entry index over an array field gets one
/// entry per element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub key_path: String,
    pub multi_entry: bool,
}

impl IndexSchema {
    /// Index named after the field it covers.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key_path: name.clone(),
            name,
            multi_entry: false,
        }
    }

    pub fn with_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = key_path.into();
        self
    }

    pub fn multi_entry(mut self) -> Self {
        self.multi_entry = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    /// Dotted path to the primary key inside each document
    pub key_path: String,
    pub indices: Vec<IndexSchema>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            indices: Vec::new(),
        }
    }

    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indices.push(index);
        self
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexSchema> {
        self.indices.iter().find(|i| i.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    pub name: String,
    pub version: u32,
    pub collections: Vec<CollectionSchema>,
}

impl StoreSchema {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            collections: Vec::new(),
        }
    }

    pub fn collection(mut self, collection: CollectionSchema) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn find_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|c| c.name == name)
    }
}
