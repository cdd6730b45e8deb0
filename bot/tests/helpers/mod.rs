//! Reusable helpers for integration tests.
//!
//! Provides [`FakePlatform`], an in-memory stand-in for the chat platform,
//! and [`TestGuild`] for wiring a registry, router and scheduler around it.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guild_policy::access::Actor;
use guild_policy::autokick::AutokickScheduler;
use guild_policy::commands::{CommandContext, CommandRouter};
use guild_policy::config::Config;
use guild_policy::platform::{AuditEntry, AuditSink, Directory, MemberSource, Messenger, Platform};
use guild_policy::store::StoreBackend;
use guild_policy::types::{ChannelRef, Member, RoleRef};
use guild_policy::{ChannelId, PlatformError, RoleId, Tenant, TenantId, TenantRegistry, UserId};

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

    pub fn add_member(&self, id: u64, name: &str, roles: &[u64], joined_at: DateTime<Utc>) {
        self.members.lock().unwrap().push(Member {
            id: UserId(id),
            roles: roles.iter().copied().map(RoleId).collect(),
            joined_at,
            nickname: None,
            username: name.to_string(),
        });
    }

    pub fn kicked_ids(&self) -> Vec<UserId> {
        self.kicked.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    pub fn messages_in(&self, channel: u64) -> Vec<String> {
        self.channel_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == ChannelId(channel))
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            directory: Arc::clone(self) as Arc<dyn Directory>,
            members: Arc::clone(self) as Arc<dyn MemberSource>,
            messenger: Arc::clone(self) as Arc<dyn Messenger>,
            audit: Arc::clone(self) as Arc<dyn AuditSink>,
            timeout: Config::default_for_test().platform_timeout,
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

    async fn channel(&self, _: TenantId, id: ChannelId) -> Result<Option<ChannelRef>, PlatformError> {
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

/// One attached guild with a router and scheduler over a fake platform.
pub struct TestGuild {
    pub id: TenantId,
    pub fake: Arc<FakePlatform>,
    pub registry: Arc<TenantRegistry>,
    pub router: CommandRouter,
    pub scheduler: Arc<AutokickScheduler>,
    /// Channel commands are invoked from.
    pub channel: ChannelId,
}

impl TestGuild {
    pub async fn new() -> Self {
        let fake = FakePlatform::new();
        let registry = Arc::new(TenantRegistry::new(StoreBackend::Memory));
        let id = TenantId(1);
        registry.attach(id).await.expect("attach guild");

        let router = CommandRouter::new(
            Arc::clone(&registry),
            fake.platform(),
            Config::default_for_test(),
        );
        let scheduler = Arc::new(
            AutokickScheduler::new(Arc::clone(&registry), fake.platform())
                .with_rate_limiter(Arc::clone(router.limiter())),
        );

        Self {
            id,
            fake,
            registry,
            router,
            scheduler,
            channel: ChannelId(50),
        }
    }

    pub fn tenant(&self) -> Arc<Tenant> {
        self.registry.get(self.id).expect("guild attached")
    }

    pub fn admin(&self) -> CommandContext {
        self.context(1, "Admin", &[], true)
    }

    pub fn member(&self, id: u64, name: &str, roles: &[u64]) -> CommandContext {
        self.context(id, name, roles, false)
    }

    fn context(&self, id: u64, name: &str, roles: &[u64], is_admin: bool) -> CommandContext {
        CommandContext {
            tenant: self.id,
            channel: self.channel,
            actor: Actor {
                id: UserId(id),
                display_name: name.to_string(),
                roles: roles.iter().copied().map(RoleId).collect(),
                is_admin,
            },
        }
    }

    /// Run a command and return the reply, panicking when there is none.
    pub async fn say(&self, ctx: &CommandContext, line: &str) -> String {
        self.try_say(ctx, line)
            .await
            .unwrap_or_else(|| panic!("no reply to '{line}'"))
    }

    pub async fn try_say(&self, ctx: &CommandContext, line: &str) -> Option<String> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        self.router.respond(ctx, name, &args).await
    }
}
