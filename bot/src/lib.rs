//! Guild Policy Engine
//!
//! Per-guild configuration and policy layer for a chat bot: typed settings,
//! command access control, unit conversions, invite cooldowns and the hourly
//! autokick sweep. The chat platform itself is reached through the traits in
//! [`platform`].

pub mod access;
pub mod autokick;
pub mod commands;
pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod interval;
pub mod members;
pub mod observability;
pub mod platform;
pub mod ratelimit;
pub mod settings;
pub mod store;
pub mod tenant;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{EngineError, PlatformError, StorageError};
pub use tenant::{Tenant, TenantRegistry};
pub use types::{ChannelId, RoleId, TenantId, UserId};
