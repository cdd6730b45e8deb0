//! Per-guild document storage.
//!
//! Every guild gets its own logical store made of named tables holding JSON
//! documents. The engine only relies on the small [`DocumentStore`] surface,
//! so the backend can be swapped between Postgres and memory.

mod document;
mod memory;
mod postgres;

use std::sync::Arc;

use sqlx::PgPool;

pub use document::{Document, DocumentStore, Filter};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::types::TenantId;

/// Selects which backend new guild stores are opened on.
#[derive(Clone)]
pub enum StoreBackend {
    /// Process-local tables, lost on restart.
    Memory,
    /// Shared Postgres pool, one logical store per guild.
    Postgres(PgPool),
}

impl StoreBackend {
    /// Open the store for a guild. Called once when the guild is attached.
    pub fn open(&self, tenant: TenantId) -> Arc<dyn DocumentStore> {
        match self {
            Self::Memory => Arc::new(MemoryStore::new()),
            Self::Postgres(pool) => Arc::new(PgStore::new(pool.clone(), tenant)),
        }
    }

    /// Guilds that already have data in the backend.
    pub async fn known_tenants(&self) -> Result<Vec<TenantId>, crate::StorageError> {
        match self {
            Self::Memory => Ok(Vec::new()),
            Self::Postgres(pool) => postgres::known_tenants(pool).await,
        }
    }
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "StoreBackend::Memory"),
            Self::Postgres(_) => write!(f, "StoreBackend::Postgres"),
        }
    }
}
