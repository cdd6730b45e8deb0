//! Chat-platform collaborators.
//!
//! The engine never talks to the network itself. Everything it needs from
//! the platform goes through these traits, implemented by the bot's gateway
//! layer (and by fakes in tests).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PlatformError;
use crate::types::{ChannelId, ChannelRef, Member, RoleId, RoleRef, TenantId, UserId};

/// Resolves stored ids back to live platform objects.
#[async_trait]
pub trait Directory: Send + Sync {
    /// `None` when the role has been deleted.
    async fn role(&self, tenant: TenantId, id: RoleId) -> Result<Option<RoleRef>, PlatformError>;

    /// `None` when the channel has been deleted.
    async fn channel(
        &self,
        tenant: TenantId,
        id: ChannelId,
    ) -> Result<Option<ChannelRef>, PlatformError>;
}

/// Guild membership and removal.
#[async_trait]
pub trait MemberSource: Send + Sync {
    async fn members(&self, tenant: TenantId) -> Result<Vec<Member>, PlatformError>;

    /// Remove a member from the guild. `reason` ends up in the platform's audit log.
    async fn kick(
        &self,
        tenant: TenantId,
        user: UserId,
        reason: Option<&str>,
    ) -> Result<(), PlatformError>;
}

/// Outbound messages and invites.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_channel(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError>;

    async fn send_direct(&self, user: UserId, text: &str) -> Result<(), PlatformError>;

    /// Create an invite link for `channel`, returning its URL.
    async fn create_invite(
        &self,
        channel: ChannelId,
        max_age: Duration,
        max_uses: u32,
    ) -> Result<String, PlatformError>;
}

/// One line of the operational audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub tenant: Option<TenantId>,
    pub channel: Option<ChannelId>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(tenant: Option<TenantId>, channel: Option<ChannelId>, message: String) -> Self {
        Self {
            tenant,
            channel,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only audit log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Audit sink that writes entries as `tracing` events on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            tenant = entry.tenant.map(|t| t.0),
            channel = entry.channel.map(|c| c.0),
            timestamp = %entry.timestamp.to_rfc3339(),
            "{}",
            entry.message
        );
    }
}

/// Bundle of collaborators handed to the router and the scheduler.
#[derive(Clone)]
pub struct Platform {
    pub directory: Arc<dyn Directory>,
    pub members: Arc<dyn MemberSource>,
    pub messenger: Arc<dyn Messenger>,
    pub audit: Arc<dyn AuditSink>,
    /// Upper bound applied to every call made through [`Platform::bounded`].
    pub timeout: Duration,
}

impl Platform {
    /// Run a collaborator call, failing with [`PlatformError::Timeout`] when it overruns.
    pub async fn bounded<T, F>(&self, call: F) -> Result<T, PlatformError>
    where
        F: Future<Output = Result<T, PlatformError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(PlatformError::Timeout))
    }

    pub async fn role(&self, tenant: TenantId, id: RoleId) -> Result<Option<RoleRef>, PlatformError> {
        self.bounded(self.directory.role(tenant, id)).await
    }

    pub async fn channel(
        &self,
        tenant: TenantId,
        id: ChannelId,
    ) -> Result<Option<ChannelRef>, PlatformError> {
        self.bounded(self.directory.channel(tenant, id)).await
    }

    pub async fn audit(&self, tenant: Option<TenantId>, channel: Option<ChannelId>, message: String) {
        self.audit.record(AuditEntry::new(tenant, channel, message)).await;
    }
}
