//! Typed per-guild settings.
//!
//! Values are stored as plain strings; callers choose how to read them back
//! through [`ConfigType`]. References to roles and channels are checked
//! against the platform on every read, so a deleted role simply reads as
//! unset.

mod section;
mod value;

pub use section::Section;
pub use value::{ConfigType, ConfigValue};

use std::time::Duration;

use crate::error::EngineError;
use crate::interval;
use crate::platform::Platform;
use crate::tenant::Tenant;
use crate::types::{parse_snowflake, ChannelId, ChannelRef, RoleId, RoleRef};

/// A setting the `config` command knows about.
#[derive(Debug, Clone, Copy)]
pub struct KnownKey {
    pub key: &'static str,
    pub kind: ConfigType,
    pub help: &'static str,
}

pub const INVITE_COOLDOWN: &str = "invite_cooldown";
pub const INVITE_TIMESPAN: &str = "invite_timespan";
pub const LOG_CHANNEL: &str = "log_channel";
pub const AUTOKICK_HASROLE: &str = "autokick_hasrole";
pub const AUTOKICK_TIMELIMIT: &str = "autokick_timelimit";
pub const AUTOKICK_REASON: &str = "autokick_reason";

/// Settings accepted by the `config` section.
pub const KNOWN_CONFIG: &[KnownKey] = &[
    KnownKey {
        key: INVITE_COOLDOWN,
        kind: ConfigType::Interval,
        help: "minimum time between invites per member",
    },
    KnownKey {
        key: INVITE_TIMESPAN,
        kind: ConfigType::Interval,
        help: "how long a generated invite stays valid",
    },
    KnownKey {
        key: LOG_CHANNEL,
        kind: ConfigType::ChannelRef,
        help: "channel receiving autokick and departure reports",
    },
    KnownKey {
        key: AUTOKICK_HASROLE,
        kind: ConfigType::RoleRef,
        help: "role whose holders are subject to autokick",
    },
    KnownKey {
        key: AUTOKICK_TIMELIMIT,
        kind: ConfigType::Interval,
        help: "how long a member may hold the autokick role",
    },
    KnownKey {
        key: AUTOKICK_REASON,
        kind: ConfigType::String,
        help: "kick reason; autokick only removes members when this is set",
    },
];

pub fn known_key(key: &str) -> Option<&'static KnownKey> {
    KNOWN_CONFIG.iter().find(|k| k.key == key)
}

/// Reload every section of a guild from its store.
pub async fn load(tenant: &Tenant) -> Result<(), EngineError> {
    Ok(tenant.load().await?)
}

/// Read a setting, coerced to `kind`.
///
/// Missing keys, unparsable intervals and references to deleted roles or
/// channels all read as `None`.
pub async fn get(
    tenant: &Tenant,
    platform: &Platform,
    section: Section,
    key: &str,
    kind: ConfigType,
) -> Result<Option<ConfigValue>, EngineError> {
    let Some(raw) = tenant.entry(section, key).await else {
        return Ok(None);
    };

    let value = match kind {
        ConfigType::String => Some(ConfigValue::String(raw)),
        ConfigType::Interval => interval::parse(&raw).map(ConfigValue::Interval),
        ConfigType::RoleRef => match parse_snowflake(&raw) {
            Some(id) => platform
                .role(tenant.id(), RoleId(id))
                .await?
                .map(ConfigValue::Role),
            None => None,
        },
        ConfigType::ChannelRef => match parse_snowflake(&raw) {
            Some(id) => platform
                .channel(tenant.id(), ChannelId(id))
                .await?
                .map(ConfigValue::Channel),
            None => None,
        },
    };
    Ok(value)
}

/// Write a setting; `None` or an empty string removes it.
pub async fn set(
    tenant: &Tenant,
    section: Section,
    key: &str,
    value: Option<&str>,
) -> Result<(), EngineError> {
    Ok(tenant.put(section, key, value).await?)
}

pub async fn get_string(
    tenant: &Tenant,
    platform: &Platform,
    key: &str,
) -> Result<Option<String>, EngineError> {
    Ok(get(tenant, platform, Section::Config, key, ConfigType::String)
        .await?
        .and_then(ConfigValue::into_string))
}

pub async fn get_interval(
    tenant: &Tenant,
    platform: &Platform,
    key: &str,
) -> Result<Option<Duration>, EngineError> {
    Ok(get(tenant, platform, Section::Config, key, ConfigType::Interval)
        .await?
        .and_then(ConfigValue::into_interval))
}

pub async fn get_role(
    tenant: &Tenant,
    platform: &Platform,
    key: &str,
) -> Result<Option<RoleRef>, EngineError> {
    Ok(get(tenant, platform, Section::Config, key, ConfigType::RoleRef)
        .await?
        .and_then(ConfigValue::into_role))
}

pub async fn get_channel(
    tenant: &Tenant,
    platform: &Platform,
    key: &str,
) -> Result<Option<ChannelRef>, EngineError> {
    Ok(get(tenant, platform, Section::Config, key, ConfigType::ChannelRef)
        .await?
        .and_then(ConfigValue::into_channel))
}

/// Check `raw` against a known key's type and return the text to store.
///
/// Intervals must parse; role and channel references must resolve and are
/// stored as bare ids.
pub async fn normalize(
    tenant: &Tenant,
    platform: &Platform,
    kind: ConfigType,
    raw: &str,
) -> Result<String, EngineError> {
    match kind {
        ConfigType::String => Ok(raw.trim().to_string()),
        ConfigType::Interval => interval::parse(raw)
            .map(|_| raw.trim().to_string())
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!(
                    "'{raw}' is not an interval, use something like 1d2h30m"
                ))
            }),
        ConfigType::RoleRef => {
            let id = parse_snowflake(raw).map(RoleId);
            match id {
                Some(id) if platform.role(tenant.id(), id).await?.is_some() => Ok(id.to_string()),
                _ => Err(EngineError::not_found(format!("Role '{raw}'"))),
            }
        }
        ConfigType::ChannelRef => {
            let id = parse_snowflake(raw).map(ChannelId);
            match id {
                Some(id) if platform.channel(tenant.id(), id).await?.is_some() => {
                    Ok(id.to_string())
                }
                _ => Err(EngineError::not_found(format!("Channel '{raw}'"))),
            }
        }
    }
}
