//! Identifier newtypes and platform-facing value types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

snowflake!(
    /// A guild. Every stored entity is scoped by one of these.
    TenantId
);
snowflake!(
    /// A guild member or any other platform user.
    UserId
);
snowflake!(
    /// A guild role.
    RoleId
);
snowflake!(
    /// A text channel.
    ChannelId
);

/// A role that still exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
}

/// A channel that still exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
}

/// A guild member as reported by the membership source.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: UserId,
    pub roles: Vec<RoleId>,
    pub joined_at: DateTime<Utc>,
    pub nickname: Option<String>,
    pub username: String,
}

impl Member {
    /// Nickname if set, otherwise the account name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// Parse a raw id or a platform mention (`<@&123>`, `<#123>`, `<@!123>`).
pub fn parse_snowflake(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .map_or(trimmed, |t| t.trim_start_matches(['@', '#', '&', '!']));
    inner.parse().ok()
}
