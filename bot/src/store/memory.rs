//! In-process document store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::document::{Document, DocumentStore, Filter};
use crate::error::StorageError;

/// Tables held in memory. Used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn all(&self, table: &str) -> Result<Vec<Document>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).cloned().unwrap_or_default())
    }

    async fn search(&self, table: &str, filter: &Filter) -> Result<Vec<Document>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert(
        &self,
        table: &str,
        doc: Document,
        filter: &Filter,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let docs = tables.entry(table.to_string()).or_default();

        let mut replaced = false;
        for existing in docs.iter_mut().filter(|d| filter.matches(d)) {
            existing.extend(doc.clone());
            replaced = true;
        }
        if !replaced {
            docs.push(doc);
        }
        Ok(())
    }

    async fn remove(&self, table: &str, filter: &Filter) -> Result<u64, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(docs) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }
}
