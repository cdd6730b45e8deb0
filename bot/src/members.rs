//! Membership ledger.
//!
//! Keeps each member's join time and last known display name in the guild's
//! `members` table, so departures can be reported after the platform has
//! already forgotten the member.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, StorageError};
use crate::interval;
use crate::platform::Platform;
use crate::settings::{self, LOG_CHANNEL};
use crate::store::{Document, Filter};
use crate::tenant::Tenant;
use crate::types::{Member, UserId};

const TABLE: &str = "members";

/// What the ledger remembers about a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub user: UserId,
    pub joined_at: DateTime<Utc>,
    pub nickname: String,
}

impl MemberRecord {
    fn from_document(doc: &Document) -> Option<Self> {
        let user = UserId(doc.get("uid")?.as_u64()?);
        let joined_at = DateTime::from_timestamp(doc.get("joined_at")?.as_i64()?, 0)?;
        let nickname = doc.get("nick").and_then(Value::as_str).unwrap_or_default();
        Some(Self {
            user,
            joined_at,
            nickname: nickname.to_string(),
        })
    }
}

fn filter(user: UserId) -> Filter {
    Filter::by("uid", user.0)
}

fn document(member: &Member) -> Document {
    [
        ("uid".to_string(), json!(member.id.0)),
        ("joined_at".to_string(), json!(member.joined_at.timestamp())),
        ("nick".to_string(), json!(member.display_name())),
    ]
    .into_iter()
    .collect()
}

/// Record a member joining, replacing any earlier record.
pub async fn record_join(tenant: &Tenant, member: &Member) -> Result<(), StorageError> {
    debug!(tenant = %tenant.id(), user = %member.id, "Recording join");
    tenant
        .store()
        .upsert(TABLE, document(member), &filter(member.id))
        .await
}

/// Bring the ledger in line with a full member listing. Returns the number
/// of records written.
#[tracing::instrument(skip(tenant, members), fields(tenant = %tenant.id(), count = members.len()))]
pub async fn refresh(tenant: &Tenant, members: &[Member]) -> Result<usize, StorageError> {
    for member in members {
        tenant
            .store()
            .upsert(TABLE, document(member), &filter(member.id))
            .await?;
    }
    Ok(members.len())
}

/// Update the remembered name. Returns `false` for members with no record.
pub async fn record_nickname(
    tenant: &Tenant,
    user: UserId,
    nickname: &str,
) -> Result<bool, StorageError> {
    if lookup(tenant, user).await?.is_none() {
        return Ok(false);
    }
    let mut doc = Document::new();
    doc.insert("nick".to_string(), json!(nickname));
    tenant.store().upsert(TABLE, doc, &filter(user)).await?;
    Ok(true)
}

pub async fn lookup(tenant: &Tenant, user: UserId) -> Result<Option<MemberRecord>, StorageError> {
    Ok(tenant
        .store()
        .search(TABLE, &filter(user))
        .await?
        .first()
        .and_then(MemberRecord::from_document))
}

/// Join times of every recorded member.
pub async fn join_times(tenant: &Tenant) -> Result<HashMap<UserId, DateTime<Utc>>, StorageError> {
    Ok(tenant
        .store()
        .all(TABLE)
        .await?
        .iter()
        .filter_map(MemberRecord::from_document)
        .map(|record| (record.user, record.joined_at))
        .collect())
}

/// Forget a departed member and describe how long they stayed.
///
/// Returns `None` when the member was never recorded.
pub async fn departure(
    tenant: &Tenant,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Option<String>, StorageError> {
    let Some(record) = lookup(tenant, user).await? else {
        return Ok(None);
    };
    tenant.store().remove(TABLE, &filter(user)).await?;

    let stayed = (now - record.joined_at).to_std().unwrap_or_default();
    Ok(Some(format!(
        "{} left after {}",
        record.nickname,
        interval::format(stayed)
    )))
}

/// [`departure`], posting the line to the guild's log channel when one is set.
#[tracing::instrument(skip(tenant, platform), fields(tenant = %tenant.id()))]
pub async fn report_departure(
    tenant: &Tenant,
    platform: &Platform,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Option<String>, EngineError> {
    let Some(line) = departure(tenant, user, now).await? else {
        return Ok(None);
    };

    if let Some(channel) = settings::get_channel(tenant, platform, LOG_CHANNEL).await? {
        if let Err(e) = platform
            .bounded(platform.messenger.send_channel(channel.id, &line))
            .await
        {
            warn!(channel = %channel.id, error = %e, "Failed to post departure report");
        }
    }
    Ok(Some(line))
}
