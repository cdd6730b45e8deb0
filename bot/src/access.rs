//! Command access resolution.
//!
//! Resolution order:
//! 1. A guild override from the access section replaces the command's
//!    default, except for commands pinned to [`Requirement::AlwaysAdmin`]
//! 2. Public commands are open to everyone
//! 3. Administrators may run anything
//! 4. Otherwise the actor must hold the required role

use std::fmt;

use crate::error::EngineError;
use crate::platform::Platform;
use crate::settings::Section;
use crate::tenant::Tenant;
use crate::types::{parse_snowflake, ChannelId, RoleId, UserId};

/// What an actor needs to run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Anyone may run it.
    Public,
    /// Administrators only, unless the guild overrides it.
    Admin,
    /// Administrators only; guild overrides are ignored.
    AlwaysAdmin,
    /// Holders of this role (and administrators).
    Role(RoleId),
}

impl Requirement {
    /// Parse a stored override value: `public`, `admin` or a role id/mention.
    pub fn parse_override(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" | "everyone" => Some(Self::Public),
            "admin" => Some(Self::Admin),
            other => parse_snowflake(other).map(|id| Self::Role(RoleId(id))),
        }
    }

    /// Text stored in the access section for this requirement.
    pub fn to_stored(self) -> String {
        match self {
            Self::Public => "public".to_string(),
            Self::Admin | Self::AlwaysAdmin => "admin".to_string(),
            Self::Role(id) => id.to_string(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Admin => write!(f, "admin"),
            Self::AlwaysAdmin => write!(f, "admin (fixed)"),
            Self::Role(id) => write!(f, "role {id}"),
        }
    }
}

/// Why a resolution came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    Public,
    Admin,
    Match,
    Denied,
}

impl AccessReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Admin => "admin",
            Self::Match => "match",
            Self::Denied => "denied",
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub allowed: bool,
    pub reason: AccessReason,
    pub requirement: Requirement,
}

/// The member invoking a command.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: UserId,
    pub display_name: String,
    pub roles: Vec<RoleId>,
    /// Administrator privilege in the invoking channel.
    pub is_admin: bool,
}

/// Apply a guild override to a command's default requirement.
pub fn effective_requirement(default: Requirement, stored: Option<&str>) -> Requirement {
    if default == Requirement::AlwaysAdmin {
        return default;
    }
    stored
        .and_then(Requirement::parse_override)
        .unwrap_or(default)
}

/// Decide whether `actor` meets `requirement`.
pub fn check(actor: &Actor, requirement: Requirement) -> Resolution {
    let (allowed, reason) = match requirement {
        Requirement::Public => (true, AccessReason::Public),
        _ if actor.is_admin => (true, AccessReason::Admin),
        Requirement::Role(role) if actor.roles.contains(&role) => (true, AccessReason::Match),
        _ => (false, AccessReason::Denied),
    };
    Resolution {
        allowed,
        reason,
        requirement,
    }
}

/// Resolve access for one invocation and record it in the audit log.
#[tracing::instrument(skip(tenant, platform, actor), fields(tenant = %tenant.id(), actor = %actor.id))]
pub async fn resolve(
    tenant: &Tenant,
    platform: &Platform,
    channel: Option<ChannelId>,
    actor: &Actor,
    command: &str,
    default: Requirement,
) -> Resolution {
    let stored = tenant.entry(Section::Access, command).await;
    let requirement = effective_requirement(default, stored.as_deref());
    let resolution = check(actor, requirement);

    platform
        .audit(
            Some(tenant.id()),
            channel,
            format!(
                "access {command} by {} ({}): requires {requirement}, {}",
                actor.display_name,
                actor.id,
                resolution.reason.as_str()
            ),
        )
        .await;

    resolution
}

/// Set or clear a guild override for `command`.
///
/// Overrides on [`Requirement::AlwaysAdmin`] commands are rejected.
pub async fn set_override(
    tenant: &Tenant,
    command: &str,
    default: Requirement,
    requirement: Option<Requirement>,
) -> Result<(), EngineError> {
    if default == Requirement::AlwaysAdmin {
        return Err(EngineError::InvalidArgument(format!(
            "Access to '{command}' is fixed to administrators"
        )));
    }
    let stored = requirement.map(Requirement::to_stored);
    Ok(tenant.put(Section::Access, command, stored.as_deref()).await?)
}

/// One row of the access listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListing {
    pub command: &'static str,
    pub requirement: Requirement,
    pub overridden: bool,
}

/// Effective requirement for every command in `commands`.
pub async fn list(
    tenant: &Tenant,
    commands: &[(&'static str, Requirement)],
) -> Vec<AccessListing> {
    let overrides = tenant.entries(Section::Access).await;
    commands
        .iter()
        .map(|(command, default)| {
            let stored = overrides.get(*command).map(String::as_str);
            let requirement = effective_requirement(*default, stored);
            AccessListing {
                command: *command,
                requirement,
                overridden: requirement != *default,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakePlatform};

    fn actor(roles: &[u64], is_admin: bool) -> Actor {
        Actor {
            id: UserId(100),
            display_name: "tester".into(),
            roles: roles.iter().copied().map(RoleId).collect(),
            is_admin,
        }
    }

    #[test]
    fn test_public_allows_everyone() {
        let res = check(&actor(&[], false), Requirement::Public);
        assert!(res.allowed);
        assert_eq!(res.reason, AccessReason::Public);
    }

    #[test]
    fn test_admin_always_allowed_without_override() {
        for requirement in [
            Requirement::Admin,
            Requirement::AlwaysAdmin,
            Requirement::Role(RoleId(1)),
        ] {
            let res = check(&actor(&[], true), requirement);
            assert!(res.allowed);
            assert_eq!(res.reason, AccessReason::Admin);
        }
    }

    #[test]
    fn test_role_match() {
        let res = check(&actor(&[1, 2], false), Requirement::Role(RoleId(2)));
        assert!(res.allowed);
        assert_eq!(res.reason, AccessReason::Match);
    }

    #[test]
    fn test_neither_role_nor_admin_denied() {
        for requirement in [
            Requirement::Admin,
            Requirement::AlwaysAdmin,
            Requirement::Role(RoleId(9)),
        ] {
            let res = check(&actor(&[1, 2], false), requirement);
            assert!(!res.allowed);
            assert_eq!(res.reason, AccessReason::Denied);
        }
    }

    #[test]
    fn test_override_replaces_default() {
        assert_eq!(
            effective_requirement(Requirement::Admin, Some("42")),
            Requirement::Role(RoleId(42))
        );
        assert_eq!(
            effective_requirement(Requirement::Role(RoleId(1)), Some("public")),
            Requirement::Public
        );
        assert_eq!(
            effective_requirement(Requirement::Public, Some("admin")),
            Requirement::Admin
        );
        assert_eq!(effective_requirement(Requirement::Public, None), Requirement::Public);
    }

    #[test]
    fn test_always_admin_ignores_override() {
        assert_eq!(
            effective_requirement(Requirement::AlwaysAdmin, Some("public")),
            Requirement::AlwaysAdmin
        );
    }

    #[test]
    fn test_garbage_override_falls_back_to_default() {
        assert_eq!(
            effective_requirement(Requirement::Admin, Some("moderators")),
            Requirement::Admin
        );
    }

    #[tokio::test]
    async fn test_resolve_uses_override_and_audits() {
        let fake = FakePlatform::new();
        let platform = fake.platform();
        let tenant = testing::tenant(1).await;

        set_override(&tenant, "autokick", Requirement::Admin, Some(Requirement::Role(RoleId(7))))
            .await
            .unwrap();

        let res = resolve(
            &tenant,
            &platform,
            Some(ChannelId(3)),
            &actor(&[7], false),
            "autokick",
            Requirement::Admin,
        )
        .await;
        assert!(res.allowed);
        assert_eq!(res.reason, AccessReason::Match);

        let log = fake.audit_log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].channel, Some(ChannelId(3)));
        assert!(log[0].message.contains("autokick"));
        assert!(log[0].message.contains("match"));
    }

    #[tokio::test]
    async fn test_denied_resolution_is_audited() {
        let fake = FakePlatform::new();
        let platform = fake.platform();
        let tenant = testing::tenant(1).await;

        let res = resolve(&tenant, &platform, None, &actor(&[], false), "config", Requirement::AlwaysAdmin)
            .await;
        assert!(!res.allowed);
        assert!(fake.audit_log.lock().unwrap()[0].message.contains("denied"));
    }

    #[tokio::test]
    async fn test_set_override_rejected_for_fixed_commands() {
        let tenant = testing::tenant(1).await;
        let result =
            set_override(&tenant, "access", Requirement::AlwaysAdmin, Some(Requirement::Public))
                .await;
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
        assert!(tenant.entries(Section::Access).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_marks_overrides() {
        let tenant = testing::tenant(1).await;
        set_override(&tenant, "ping", Requirement::Public, Some(Requirement::Role(RoleId(3))))
            .await
            .unwrap();

        let rows = list(
            &tenant,
            &[("ping", Requirement::Public), ("config", Requirement::AlwaysAdmin)],
        )
        .await;
        assert_eq!(rows[0].requirement, Requirement::Role(RoleId(3)));
        assert!(rows[0].overridden);
        assert_eq!(rows[1].requirement, Requirement::AlwaysAdmin);
        assert!(!rows[1].overridden);

        set_override(&tenant, "ping", Requirement::Public, None).await.unwrap();
        let rows = list(&tenant, &[("ping", Requirement::Public)]).await;
        assert!(!rows[0].overridden);
    }
}
