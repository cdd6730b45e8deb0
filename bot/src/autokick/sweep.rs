use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{candidates, read_policy};
use crate::error::EngineError;
use crate::platform::Platform;
use crate::tenant::{Tenant, TenantRegistry};
use crate::types::{TenantId, UserId};

/// What one sweep did in one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub kicked: Vec<UserId>,
    /// Members that matched while no reason was set.
    pub dry_run: Vec<UserId>,
    pub failed: Vec<UserId>,
    /// Report lines, in member order.
    pub lines: Vec<String>,
    /// Whether the report reached the log channel.
    pub posted: bool,
}

/// Totals across all guilds for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub tenants_swept: usize,
    pub tenants_failed: Vec<TenantId>,
    pub kicked: usize,
    pub dry_run: usize,
    pub failed: usize,
}

/// Apply the autokick policy to one guild.
///
/// Returns `None` when the guild has no complete policy. A failed removal is
/// logged and reported, and the sweep carries on with the next member.
#[tracing::instrument(skip(tenant, platform), fields(tenant = %tenant.id()))]
pub async fn sweep_tenant(
    tenant: &Tenant,
    platform: &Platform,
    now: DateTime<Utc>,
) -> Result<Option<SweepOutcome>, EngineError> {
    let Some(policy) = read_policy(tenant, platform).await? else {
        debug!("No autokick policy");
        return Ok(None);
    };

    let mut outcome = SweepOutcome::default();
    for candidate in candidates(tenant, platform, &policy, now).await? {
        let summary = candidate.describe(&policy.role);

        let Some(reason) = policy.reason.as_deref() else {
            outcome.dry_run.push(candidate.user);
            outcome.lines.push(format!("Would kick {summary}"));
            continue;
        };

        match platform
            .bounded(platform.members.kick(tenant.id(), candidate.user, Some(reason)))
            .await
        {
            Ok(()) => {
                info!(user = %candidate.user, "Autokicked member");
                platform
                    .audit(
                        Some(tenant.id()),
                        None,
                        format!("autokick removed {} ({}): {reason}", candidate.display_name, candidate.user),
                    )
                    .await;
                outcome.kicked.push(candidate.user);
                outcome.lines.push(format!("Kicked {summary}"));
            }
            Err(e) => {
                warn!(user = %candidate.user, error = %e, "Autokick removal failed");
                outcome.failed.push(candidate.user);
                outcome.lines.push(format!("Failed to kick {summary}: {e}"));
            }
        }
    }

    if outcome.lines.is_empty() {
        return Ok(Some(outcome));
    }
    if let Some(channel) = &policy.log_channel {
        let report = outcome.lines.join("\n");
        match platform
            .bounded(platform.messenger.send_channel(channel.id, &report))
            .await
        {
            Ok(()) => outcome.posted = true,
            Err(e) => warn!(channel = %channel.id, error = %e, "Failed to post autokick report"),
        }
    }

    Ok(Some(outcome))
}

/// Sweep every attached guild concurrently. A failing guild is logged and
/// skipped.
pub async fn sweep_all(
    registry: &TenantRegistry,
    platform: &Platform,
    now: DateTime<Utc>,
) -> SweepSummary {
    let tenants = registry.all();
    let results = join_all(
        tenants
            .iter()
            .map(|tenant| sweep_tenant(tenant, platform, now)),
    )
    .await;

    let mut summary = SweepSummary::default();
    for (tenant, result) in tenants.iter().zip(results) {
        match result {
            Ok(Some(outcome)) => {
                summary.tenants_swept += 1;
                summary.kicked += outcome.kicked.len();
                summary.dry_run += outcome.dry_run.len();
                summary.failed += outcome.failed.len();
            }
            Ok(None) => {}
            Err(e) => {
                warn!(tenant = %tenant.id(), error = %e, "Autokick sweep failed for guild");
                summary.tenants_failed.push(tenant.id());
            }
        }
    }

    summary
}
