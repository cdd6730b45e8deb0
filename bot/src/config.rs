//! Process Configuration
//!
//! Loads configuration from environment variables. Per-guild settings live in
//! [`crate::settings`]; this only covers what the process itself needs.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` connection URL. Guild data stays in memory when unset.
    pub database_url: Option<String>,

    /// Upper bound on any single chat-platform call (default: 10s)
    pub platform_timeout: Duration,

    /// Invite cooldown used when a guild has not set `invite_cooldown` (default: 3600s)
    pub default_invite_cooldown: Duration,

    /// Invite lifetime used when a guild has not set `invite_timespan` (default: 3600s)
    pub default_invite_timespan: Duration,
}

fn env_secs(name: &str, default: u64) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} must be a whole number of seconds"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

impl Config {
    /// Load configuration from the environment (and `.env` when present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            platform_timeout: env_secs("PLATFORM_TIMEOUT_SECS", 10)?,
            default_invite_cooldown: env_secs("DEFAULT_INVITE_COOLDOWN_SECS", 3600)?,
            default_invite_timespan: env_secs("DEFAULT_INVITE_TIMESPAN_SECS", 3600)?,
        })
    }

    /// Create a default configuration for testing.
    ///
    /// Uses in-memory stores and a short platform timeout.
    #[must_use]
    pub const fn default_for_test() -> Self {
        Self {
            database_url: None,
            platform_timeout: Duration::from_secs(2),
            default_invite_cooldown: Duration::from_secs(3600),
            default_invite_timespan: Duration::from_secs(3600),
        }
    }
}
