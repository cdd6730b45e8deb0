//! Document store contract.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StorageError;

/// A stored record: a flat JSON object.
pub type Document = Map<String, Value>;

/// Field-equality predicate. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a filter on a single field.
    pub fn by(field: &str, value: impl Into<Value>) -> Self {
        Self::new().and(field, value)
    }

    #[must_use]
    pub fn and(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.push((field.to_string(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }

    /// The filter as a JSON object, suitable for containment queries.
    pub fn to_document(&self) -> Document {
        self.fields.iter().cloned().collect()
    }
}

/// Storage for one guild.
///
/// Each method addresses a named table inside the guild's store. Upserts
/// merge into every document matching `filter`, or insert when none does.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in a table, in insertion order.
    async fn all(&self, table: &str) -> Result<Vec<Document>, StorageError>;

    /// Documents matching `filter`.
    async fn search(&self, table: &str, filter: &Filter) -> Result<Vec<Document>, StorageError>;

    /// Merge `doc` into the documents matching `filter`, inserting it when none match.
    async fn upsert(&self, table: &str, doc: Document, filter: &Filter)
        -> Result<(), StorageError>;

    /// Remove matching documents and return how many were removed.
    async fn remove(&self, table: &str, filter: &Filter) -> Result<u64, StorageError>;
}
