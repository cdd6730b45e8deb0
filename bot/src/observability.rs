//! Tracing setup for processes embedding the engine.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "guild_policy=debug";

/// Install the JSON tracing subscriber, filtered by `RUST_LOG`.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .json()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
