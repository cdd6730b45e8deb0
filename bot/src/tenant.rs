//! Guild registry and per-guild section caches.
//!
//! Each attached guild owns its document store plus an in-memory snapshot of
//! every settings section. Snapshots are rebuilt from the store after every
//! write, so readers never observe a value the store does not hold.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{EngineError, StorageError};
use crate::settings::Section;
use crate::store::{Document, DocumentStore, Filter, StoreBackend};
use crate::types::TenantId;

type Snapshot = Arc<BTreeMap<String, String>>;

/// Cached copy of one section plus the lock serializing its writers.
#[derive(Default)]
struct SectionCache {
    snapshot: RwLock<Snapshot>,
    write: Mutex<()>,
}

/// One attached guild.
pub struct Tenant {
    id: TenantId,
    store: Arc<dyn DocumentStore>,
    sections: HashMap<Section, SectionCache>,
}

impl Tenant {
    /// Wrap a store. The caches start empty; call [`Tenant::load`] before use.
    pub fn new(id: TenantId, store: Arc<dyn DocumentStore>) -> Self {
        let sections = Section::ALL
            .iter()
            .map(|s| (*s, SectionCache::default()))
            .collect();
        Self {
            id,
            store,
            sections,
        }
    }

    pub const fn id(&self) -> TenantId {
        self.id
    }

    /// The guild's document store, for tables outside the settings sections.
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    fn cache(&self, section: Section) -> &SectionCache {
        // Every variant is inserted in `new`.
        &self.sections[&section]
    }

    /// Rebuild every section cache from the store.
    #[tracing::instrument(skip(self), fields(tenant = %self.id))]
    pub async fn load(&self) -> Result<(), StorageError> {
        for section in Section::ALL {
            self.refresh(*section).await?;
        }
        debug!("Guild settings loaded");
        Ok(())
    }

    /// Re-read one section and swap in the new snapshot.
    ///
    /// On a store failure the previous snapshot stays in place.
    pub async fn refresh(&self, section: Section) -> Result<(), StorageError> {
        let docs = self.store.all(section.table()).await?;

        let mut entries = BTreeMap::new();
        for doc in docs {
            match (doc.get("key"), doc.get("value")) {
                (Some(Value::String(k)), Some(Value::String(v))) => {
                    entries.insert(k.clone(), v.clone());
                }
                _ => warn!(
                    tenant = %self.id,
                    section = section.table(),
                    "Skipping malformed settings document"
                ),
            }
        }

        *self.cache(section).snapshot.write().await = Arc::new(entries);
        Ok(())
    }

    /// Current snapshot of a section.
    pub async fn entries(&self, section: Section) -> Snapshot {
        Arc::clone(&*self.cache(section).snapshot.read().await)
    }

    /// Raw cached value for a key.
    pub async fn entry(&self, section: Section, key: &str) -> Option<String> {
        self.cache(section).snapshot.read().await.get(key).cloned()
    }

    /// Write (or with `None`/empty, delete) a key and refresh the section.
    ///
    /// Writers to the same section are serialized, so the refresh that
    /// follows a write always includes it. A failed refresh is retried once;
    /// if that also fails the error is returned, the previous snapshot stays
    /// in place, and the section catches up on its next successful refresh.
    #[tracing::instrument(skip(self, value), fields(tenant = %self.id, section = section.table()))]
    pub async fn put(
        &self,
        section: Section,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StorageError> {
        let _guard = self.cache(section).write.lock().await;
        let filter = Filter::by("key", key);

        match value.filter(|v| !v.is_empty()) {
            Some(value) => {
                let doc: Document = [
                    ("key".to_string(), json!(key)),
                    ("value".to_string(), json!(value)),
                ]
                .into_iter()
                .collect();
                self.store.upsert(section.table(), doc, &filter).await?;
            }
            None => {
                self.store.remove(section.table(), &filter).await?;
            }
        }

        if let Err(e) = self.refresh(section).await {
            warn!(error = %e, "Refresh after write failed, retrying");
            self.refresh(section).await?;
        }
        Ok(())
    }
}

/// All guilds attached to this process.
pub struct TenantRegistry {
    backend: StoreBackend,
    tenants: DashMap<TenantId, Arc<Tenant>>,
}

impl TenantRegistry {
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            backend,
            tenants: DashMap::new(),
        }
    }

    /// Attach a guild, opening its store on the configured backend.
    ///
    /// Attaching an already attached guild returns the existing handle.
    pub async fn attach(&self, id: TenantId) -> Result<Arc<Tenant>, StorageError> {
        if let Some(existing) = self.get(id) {
            return Ok(existing);
        }
        self.attach_with_store(id, self.backend.open(id)).await
    }

    /// Attach a guild backed by an explicit store.
    pub async fn attach_with_store(
        &self,
        id: TenantId,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Arc<Tenant>, StorageError> {
        let tenant = Arc::new(Tenant::new(id, store));
        tenant.load().await?;

        let tenant = Arc::clone(self.tenants.entry(id).or_insert(tenant).value());
        info!(tenant = %id, "Guild attached");
        Ok(tenant)
    }

    /// Attach every guild the backend already holds data for.
    pub async fn attach_known(&self) -> Result<usize, StorageError> {
        let known = self.backend.known_tenants().await?;
        for id in &known {
            self.attach(*id).await?;
        }
        Ok(known.len())
    }

    pub fn detach(&self, id: TenantId) -> Option<Arc<Tenant>> {
        let removed = self.tenants.remove(&id).map(|(_, t)| t);
        if removed.is_some() {
            info!(tenant = %id, "Guild detached");
        }
        removed
    }

    pub fn get(&self, id: TenantId) -> Option<Arc<Tenant>> {
        self.tenants.get(&id).map(|t| Arc::clone(t.value()))
    }

    /// Like [`TenantRegistry::get`], but a missing guild is a `NotFound` error.
    pub fn require(&self, id: TenantId) -> Result<Arc<Tenant>, EngineError> {
        self.get(id)
            .ok_or_else(|| EngineError::not_found(format!("Guild {id}")))
    }

    /// Every attached guild, ordered by id.
    pub fn all(&self) -> Vec<Arc<Tenant>> {
        let mut tenants: Vec<_> = self.tenants.iter().map(|t| Arc::clone(t.value())).collect();
        tenants.sort_by_key(|t| t.id());
        tenants
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}
