//! Chat command routing.
//!
//! The gateway layer splits an incoming message into a command name and
//! arguments and hands them to [`CommandRouter::respond`]. Every command is
//! checked against the access resolver before its handler runs; denied
//! invocations produce no reply at all.

mod admin;
mod dictionary;
mod member;
mod units;

use std::sync::Arc;

use tracing::debug;

use crate::access::{self, Actor, Requirement};
use crate::config::Config;
use crate::error::EngineError;
use crate::platform::Platform;
use crate::ratelimit::RateLimiter;
use crate::tenant::{Tenant, TenantRegistry};
use crate::types::{ChannelId, TenantId};

/// A command the router knows, with the access it needs by default.
#[derive(Debug, Clone, Copy)]
pub struct CommandDef {
    pub name: &'static str,
    pub default: Requirement,
    pub usage: &'static str,
}

pub const COMMANDS: &[CommandDef] = &[
    CommandDef {
        name: "ping",
        default: Requirement::Public,
        usage: "ping",
    },
    CommandDef {
        name: "invite",
        default: Requirement::Public,
        usage: "invite",
    },
    CommandDef {
        name: "config",
        default: Requirement::AlwaysAdmin,
        usage: "config [list | help | get KEY | set KEY VALUE | unset KEY]",
    },
    CommandDef {
        name: "access",
        default: Requirement::AlwaysAdmin,
        usage: "access [list | set COMMAND ROLE|public|admin | clear COMMAND]",
    },
    CommandDef {
        name: "define",
        default: Requirement::Admin,
        usage: "define WORD [TEXT...]",
    },
    CommandDef {
        name: "whatis",
        default: Requirement::Public,
        usage: "whatis [WORD]",
    },
    CommandDef {
        name: "convert",
        default: Requirement::Public,
        usage: "convert VALUE UNIT [SUBUNIT]",
    },
    CommandDef {
        name: "conversion",
        default: Requirement::Admin,
        usage: "conversion [list | add UNIT[:SUB] TARGET[:SUB] FACTOR | remove UNIT[:SUB]]",
    },
    CommandDef {
        name: "autokick",
        default: Requirement::Admin,
        usage: "autokick",
    },
];

pub fn find_command(name: &str) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|def| def.name == name)
}

/// `(name, default)` pairs for the access listing.
pub fn command_defaults() -> Vec<(&'static str, Requirement)> {
    COMMANDS.iter().map(|def| (def.name, def.default)).collect()
}

/// Where a command was invoked and by whom.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub tenant: TenantId,
    pub channel: ChannelId,
    pub actor: Actor,
}

fn usage(def: &CommandDef) -> EngineError {
    EngineError::InvalidArgument(format!("Usage: {}", def.usage))
}

/// Everything a handler may touch while running one command.
struct Invocation<'a> {
    router: &'a CommandRouter,
    ctx: &'a CommandContext,
    tenant: &'a Tenant,
    def: &'static CommandDef,
    args: &'a [&'a str],
}

/// Dispatches commands to their handlers.
pub struct CommandRouter {
    registry: Arc<TenantRegistry>,
    limiter: Arc<RateLimiter>,
    platform: Platform,
    config: Config,
}

impl CommandRouter {
    pub fn new(registry: Arc<TenantRegistry>, platform: Platform, config: Config) -> Self {
        Self {
            registry,
            limiter: Arc::new(RateLimiter::new()),
            platform,
            config,
        }
    }

    /// The cooldown tracker, for handing to [`AutokickScheduler::with_rate_limiter`].
    ///
    /// [`AutokickScheduler::with_rate_limiter`]: crate::autokick::AutokickScheduler::with_rate_limiter
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run a command. `Ok(None)` means nothing should be sent back.
    #[tracing::instrument(skip(self, ctx, args), fields(tenant = %ctx.tenant, actor = %ctx.actor.id))]
    pub async fn handle(
        &self,
        ctx: &CommandContext,
        name: &str,
        args: &[&str],
    ) -> Result<Option<String>, EngineError> {
        let def = find_command(name).ok_or_else(|| EngineError::not_found(format!("Command '{name}'")))?;
        let tenant = self.registry.require(ctx.tenant)?;

        let resolution = access::resolve(
            &tenant,
            &self.platform,
            Some(ctx.channel),
            &ctx.actor,
            def.name,
            def.default,
        )
        .await;
        if !resolution.allowed {
            debug!(command = def.name, "Access denied");
            return Ok(None);
        }

        let call = Invocation {
            router: self,
            ctx,
            tenant: &tenant,
            def,
            args,
        };
        let reply = match def.name {
            "ping" => member::ping(&call).await?,
            "invite" => member::invite(&call).await?,
            "config" => admin::config(&call).await?,
            "access" => admin::access(&call).await?,
            "autokick" => admin::autokick(&call).await?,
            "define" => dictionary::define(&call).await?,
            "whatis" => dictionary::whatis(&call).await?,
            "convert" => units::convert(&call).await?,
            "conversion" => units::conversion(&call).await?,
            _ => return Err(EngineError::not_found(format!("Command '{name}'"))),
        };
        Ok(Some(reply))
    }

    /// [`CommandRouter::handle`] with errors turned into user-facing text.
    pub async fn respond(&self, ctx: &CommandContext, name: &str, args: &[&str]) -> Option<String> {
        match self.handle(ctx, name, args).await {
            Ok(reply) => reply,
            Err(e) => e.user_message(),
        }
    }
}
