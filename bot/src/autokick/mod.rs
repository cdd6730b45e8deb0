//! Automatic removal of members who hold a role for too long.
//!
//! A guild opts in by setting `autokick_hasrole` and `autokick_timelimit`.
//! Members are only actually removed once `autokick_reason` is set as well;
//! until then every sweep is a dry run that just reports who would go.

mod scheduler;
mod sweep;

pub use scheduler::{AutokickScheduler, SWEEP_PERIOD};
pub use sweep::{sweep_all, sweep_tenant, SweepOutcome, SweepSummary};

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::EngineError;
use crate::interval;
use crate::members;
use crate::platform::Platform;
use crate::settings::{self, AUTOKICK_HASROLE, AUTOKICK_REASON, AUTOKICK_TIMELIMIT, LOG_CHANNEL};
use crate::tenant::Tenant;
use crate::types::{ChannelRef, RoleRef, UserId};

/// A guild's autokick settings, read fresh on every sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub role: RoleRef,
    pub timelimit: Duration,
    /// Without a reason the sweep only reports.
    pub reason: Option<String>,
    pub log_channel: Option<ChannelRef>,
}

impl Policy {
    pub const fn is_dry_run(&self) -> bool {
        self.reason.is_none()
    }

    pub fn describe(&self) -> String {
        let mode = match &self.reason {
            Some(reason) => format!("kicking with reason \"{reason}\""),
            None => "dry run, set autokick_reason to enable kicking".to_string(),
        };
        format!(
            "Members holding {} for more than {}: {mode}",
            self.role.name,
            interval::format(self.timelimit)
        )
    }
}

/// A member the policy applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub user: UserId,
    pub display_name: String,
    pub held_for: Duration,
}

impl Candidate {
    pub fn describe(&self, role: &RoleRef) -> String {
        format!(
            "{} ({}), held {} for {}",
            self.display_name,
            self.user,
            role.name,
            interval::format(self.held_for)
        )
    }
}

/// Read the guild's policy. `None` when the role or time limit is unset or
/// the role no longer exists.
pub async fn read_policy(tenant: &Tenant, platform: &Platform) -> Result<Option<Policy>, EngineError> {
    let Some(role) = settings::get_role(tenant, platform, AUTOKICK_HASROLE).await? else {
        return Ok(None);
    };
    let Some(timelimit) = settings::get_interval(tenant, platform, AUTOKICK_TIMELIMIT).await? else {
        return Ok(None);
    };
    let reason = settings::get_string(tenant, platform, AUTOKICK_REASON).await?;
    let log_channel = settings::get_channel(tenant, platform, LOG_CHANNEL).await?;

    Ok(Some(Policy {
        role,
        timelimit,
        reason,
        log_channel,
    }))
}

/// Members holding the policy role for longer than its time limit.
///
/// Join times come from the membership ledger when it knows the member and
/// from the platform otherwise.
pub async fn candidates(
    tenant: &Tenant,
    platform: &Platform,
    policy: &Policy,
    now: DateTime<Utc>,
) -> Result<Vec<Candidate>, EngineError> {
    let listing = platform
        .bounded(platform.members.members(tenant.id()))
        .await?;

    let ledger = members::join_times(tenant).await.unwrap_or_else(|e| {
        warn!(tenant = %tenant.id(), error = %e, "Membership ledger unavailable, using platform join times");
        Default::default()
    });

    Ok(listing
        .iter()
        .filter(|member| member.has_role(policy.role.id))
        .filter_map(|member| {
            let joined = ledger.get(&member.id).copied().unwrap_or(member.joined_at);
            let held_for = (now - joined).to_std().ok()?;
            (held_for > policy.timelimit).then(|| Candidate {
                user: member.id,
                display_name: member.display_name().to_string(),
                held_for,
            })
        })
        .collect())
}

/// Lines describing the policy and who the next sweep would act on.
pub async fn preview(
    tenant: &Tenant,
    platform: &Platform,
    now: DateTime<Utc>,
) -> Result<Vec<String>, EngineError> {
    let Some(policy) = read_policy(tenant, platform).await? else {
        return Ok(vec![format!(
            "Autokick is off, set {AUTOKICK_HASROLE} and {AUTOKICK_TIMELIMIT} to enable it"
        )]);
    };

    let found = candidates(tenant, platform, &policy, now).await?;
    let mut lines = vec![policy.describe()];
    if found.is_empty() {
        lines.push("No members currently match".to_string());
    } else {
        lines.extend(found.iter().map(|c| c.describe(&policy.role)));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::settings::Section;
    use crate::testing::{self, FakePlatform};
    use crate::types::{Member, RoleId};

    fn member(id: u64, roles: &[u64], joined_at: DateTime<Utc>) -> Member {
        Member {
            id: UserId(id),
            roles: roles.iter().copied().map(RoleId).collect(),
            joined_at,
            nickname: None,
            username: format!("user{id}"),
        }
    }

    async fn configure(tenant: &Tenant, entries: &[(&str, &str)]) {
        for &(key, value) in entries {
            settings::set(tenant, Section::Config, key, Some(value)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_policy_requires_role_and_timelimit() {
        let fake = FakePlatform::new();
        fake.add_role(7, "newcomer");
        let platform = fake.platform();
        let tenant = testing::tenant(1).await;

        configure(&tenant, &[(AUTOKICK_HASROLE, "7")]).await;
        assert!(read_policy(&tenant, &platform).await.unwrap().is_none());

        configure(&tenant, &[(AUTOKICK_TIMELIMIT, "24h")]).await;
        let policy = read_policy(&tenant, &platform).await.unwrap().unwrap();
        assert_eq!(policy.timelimit, Duration::from_secs(86400));
        assert!(policy.is_dry_run());
    }

    #[tokio::test]
    async fn test_deleted_role_disables_policy() {
        let fake = FakePlatform::new();
        let platform = fake.platform();
        let tenant = testing::tenant(1).await;
        configure(&tenant, &[(AUTOKICK_HASROLE, "7"), (AUTOKICK_TIMELIMIT, "24h")]).await;

        assert!(read_policy(&tenant, &platform).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_candidates_need_role_and_age() {
        let fake = FakePlatform::new();
        fake.add_role(7, "newcomer");
        let now = Utc::now();
        fake.members.lock().unwrap().extend([
            member(1, &[7], now - ChronoDuration::hours(30)),
            member(2, &[7], now - ChronoDuration::hours(2)),
            member(3, &[8], now - ChronoDuration::hours(30)),
        ]);
        let platform = fake.platform();
        let tenant = testing::tenant(1).await;
        configure(&tenant, &[(AUTOKICK_HASROLE, "7"), (AUTOKICK_TIMELIMIT, "24h")]).await;

        let policy = read_policy(&tenant, &platform).await.unwrap().unwrap();
        let found = candidates(&tenant, &platform, &policy, now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user, UserId(1));
        assert_eq!(found[0].display_name, "user1");
    }

    #[tokio::test]
    async fn test_ledger_join_time_wins() {
        let fake = FakePlatform::new();
        fake.add_role(7, "newcomer");
        let now = Utc::now();
        // The platform reports an old join, but the ledger saw a rejoin an hour ago.
        fake.members
            .lock()
            .unwrap()
            .push(member(1, &[7], now - ChronoDuration::hours(30)));
        let platform = fake.platform();
        let tenant = testing::tenant(1).await;
        configure(&tenant, &[(AUTOKICK_HASROLE, "7"), (AUTOKICK_TIMELIMIT, "24h")]).await;
        members::record_join(&tenant, &member(1, &[7], now - ChronoDuration::hours(1)))
            .await
            .unwrap();

        let policy = read_policy(&tenant, &platform).await.unwrap().unwrap();
        assert!(candidates(&tenant, &platform, &policy, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_when_disabled() {
        let fake = FakePlatform::new();
        let platform = fake.platform();
        let tenant = testing::tenant(1).await;

        let lines = preview(&tenant, &platform, Utc::now()).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Autokick is off"));
    }
}
