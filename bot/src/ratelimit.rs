//! Per-member action cooldowns.
//!
//! The last successful use of an action is stored in the guild's
//! `ratelimit` table as unix seconds. Checking and stamping happen under a
//! per-key lock, so two simultaneous requests can never both be admitted.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::store::{Document, Filter};
use crate::tenant::Tenant;
use crate::types::{TenantId, UserId};

const TABLE: &str = "ratelimit";

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the action may go ahead (and has been stamped)
    pub allowed: bool,
    /// Seconds left before the next use; 0 when allowed, otherwise at least 1
    pub remaining_secs: u64,
}

type Key = (TenantId, UserId, String);

/// Cooldown tracker shared by every command handler.
#[derive(Default)]
pub struct RateLimiter {
    locks: DashMap<Key, Arc<Mutex<()>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_lock(&self, key: Key) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(key).or_default().value())
    }

    /// Check the cooldown for `action` and stamp it when allowed.
    pub async fn check_and_record(
        &self,
        tenant: &Tenant,
        actor: UserId,
        action: &str,
        min_interval_secs: u64,
    ) -> Result<RateLimitResult, StorageError> {
        self.check_and_record_at(tenant, actor, action, min_interval_secs, Utc::now().timestamp())
            .await
    }

    /// [`RateLimiter::check_and_record`] with an explicit clock.
    #[tracing::instrument(skip(self, tenant), fields(tenant = %tenant.id()))]
    pub async fn check_and_record_at(
        &self,
        tenant: &Tenant,
        actor: UserId,
        action: &str,
        min_interval_secs: u64,
        now: i64,
    ) -> Result<RateLimitResult, StorageError> {
        let lock = self.key_lock((tenant.id(), actor, action.to_string()));
        let _guard = lock.lock().await;

        let filter = Filter::by("uid", actor.0).and("action", action);
        let last = tenant
            .store()
            .search(TABLE, &filter)
            .await?
            .first()
            .and_then(|doc| doc.get("last"))
            .and_then(Value::as_i64);

        let min_interval = min_interval_secs as i64;
        if let Some(last) = last {
            let elapsed = now - last;
            if elapsed <= min_interval {
                let remaining = (min_interval - elapsed).max(1) as u64;
                debug!(remaining, "Cooldown active");
                return Ok(RateLimitResult {
                    allowed: false,
                    remaining_secs: remaining,
                });
            }
        }

        let doc: Document = [
            ("uid".to_string(), json!(actor.0)),
            ("action".to_string(), json!(action)),
            ("last".to_string(), json!(now)),
        ]
        .into_iter()
        .collect();
        tenant.store().upsert(TABLE, doc, &filter).await?;

        Ok(RateLimitResult {
            allowed: true,
            remaining_secs: 0,
        })
    }

    /// Drop key locks nobody is waiting on.
    ///
    /// The stored stamps are untouched. [`AutokickScheduler`] calls this on
    /// every tick when given the limiter.
    ///
    /// [`AutokickScheduler`]: crate::autokick::AutokickScheduler
    pub fn cleanup(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of keys currently holding a lock.
    pub fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}
