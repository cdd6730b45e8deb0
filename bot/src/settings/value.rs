use std::fmt;
use std::time::Duration;

use crate::interval;
use crate::types::{ChannelRef, RoleRef};

/// How a stored string should be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    String,
    RoleRef,
    ChannelRef,
    Interval,
}

impl ConfigType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::String => "text",
            Self::RoleRef => "role",
            Self::ChannelRef => "channel",
            Self::Interval => "interval",
        }
    }
}

/// A setting after coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    String(String),
    Role(RoleRef),
    Channel(ChannelRef),
    Interval(Duration),
}

impl ConfigValue {
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_role(self) -> Option<RoleRef> {
        match self {
            Self::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_channel(self) -> Option<ChannelRef> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_interval(self) -> Option<Duration> {
        match self {
            Self::Interval(d) => Some(d),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "'{s}'"),
            Self::Role(r) => write!(f, "@{} ({})", r.name, r.id),
            Self::Channel(c) => write!(f, "#{} ({})", c.name, c.id),
            Self::Interval(d) => write!(f, "{}", interval::format(*d)),
        }
    }
}
