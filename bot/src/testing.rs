//! In-memory platform fake for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::platform::{AuditEntry, AuditSink, Directory, MemberSource, Messenger, Platform};
use crate::store::{MemoryStore, StoreBackend};
use crate::tenant::{Tenant, TenantRegistry};
use crate::types::{ChannelId, ChannelRef, Member, RoleId, RoleRef, TenantId, UserId};

#[derive(Default)]
pub struct FakePlatform {
    pub roles: Mutex<HashMap<RoleId, String>>,
    pub channels: Mutex<HashMap<ChannelId, String>>,
    pub members: Mutex<Vec<Member>>,
    pub kicked: Mutex<Vec<(UserId, Option<String>)>>,
    pub failing_kicks: Mutex<HashSet<UserId>>,
    pub channel_messages: Mutex<Vec<(ChannelId, String)>>,
    pub direct_messages: Mutex<Vec<(UserId, String)>>,
    pub audit_log: Mutex<Vec<AuditEntry>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_role(&self, id: u64, name: &str) {
        self.roles.lock().unwrap().insert(RoleId(id), name.to_string());
    }

    pub fn add_channel(&self, id: u64, name: &str) {
        self.channels.lock().unwrap().insert(ChannelId(id), name.to_string());
    }

    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            directory: Arc::clone(self) as Arc<dyn Directory>,
            members: Arc::clone(self) as Arc<dyn MemberSource>,
            messenger: Arc::clone(self) as Arc<dyn Messenger>,
            audit: Arc::clone(self) as Arc<dyn AuditSink>,
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl Directory for FakePlatform {
    async fn role(&self, _: TenantId, id: RoleId) -> Result<Option<RoleRef>, PlatformError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(&id)
            .map(|name| RoleRef { id, name: name.clone() }))
    }

    async fn channel(
        &self,
        _: TenantId,
        id: ChannelId,
    ) -> Result<Option<ChannelRef>, PlatformError> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .get(&id)
            .map(|name| ChannelRef { id, name: name.clone() }))
    }
}

#[async_trait]
impl MemberSource for FakePlatform {
    async fn members(&self, _: TenantId) -> Result<Vec<Member>, PlatformError> {
        Ok(self.members.lock().unwrap().clone())
    }

    async fn kick(&self, _: TenantId, user: UserId, reason: Option<&str>) -> Result<(), PlatformError> {
        if self.failing_kicks.lock().unwrap().contains(&user) {
            return Err(PlatformError::Rejected("missing permissions".into()));
        }
        self.members.lock().unwrap().retain(|m| m.id != user);
        self.kicked
            .lock()
            .unwrap()
            .push((user, reason.map(str::to_string)));
        Ok(())
    }
}

#[async_trait]
impl Messenger for FakePlatform {
    async fn send_channel(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError> {
        self.channel_messages
            .lock()
            .unwrap()
            .push((channel, text.to_string()));
        Ok(())
    }

    async fn send_direct(&self, user: UserId, text: &str) -> Result<(), PlatformError> {
        self.direct_messages
            .lock()
            .unwrap()
            .push((user, text.to_string()));
        Ok(())
    }

    async fn create_invite(
        &self,
        channel: ChannelId,
        max_age: Duration,
        max_uses: u32,
    ) -> Result<String, PlatformError> {
        Ok(format!(
            "https://chat.example/invite/{channel}-{}-{max_uses}",
            max_age.as_secs()
        ))
    }
}

#[async_trait]
impl AuditSink for FakePlatform {
    async fn record(&self, entry: AuditEntry) {
        self.audit_log.lock().unwrap().push(entry);
    }
}

/// A loaded guild on a fresh memory store.
pub async fn tenant(id: u64) -> Arc<Tenant> {
    let tenant = Arc::new(Tenant::new(TenantId(id), Arc::new(MemoryStore::new())));
    tenant.load().await.unwrap();
    tenant
}

pub fn registry() -> TenantRegistry {
    TenantRegistry::new(StoreBackend::Memory)
}
