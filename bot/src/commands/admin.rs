use chrono::Utc;

use super::{command_defaults, find_command, usage, Invocation};
use crate::access::{self, Requirement};
use crate::autokick;
use crate::error::EngineError;
use crate::settings::{self, known_key, Section, KNOWN_CONFIG};
use crate::types::RoleId;

pub(super) async fn config(call: &Invocation<'_>) -> Result<String, EngineError> {
    let tenant = call.tenant;
    let platform = &call.router.platform;

    match call.args {
        [] | ["list"] => {
            let stored = tenant.entries(Section::Config).await;
            let mut text = String::from("Config values:");
            for known in KNOWN_CONFIG {
                match stored.get(known.key) {
                    Some(value) => text.push_str(&format!("\n* {} = '{value}'", known.key)),
                    None => text.push_str(&format!("\n* {} = _Not set_", known.key)),
                }
            }
            Ok(text)
        }
        ["help"] => {
            let mut text = String::from(
                "config set KEY VALUE\nconfig get KEY\nconfig unset KEY\nKnown settings:",
            );
            for known in KNOWN_CONFIG {
                text.push_str(&format!("\n* {} ({}): {}", known.key, known.kind.label(), known.help));
            }
            Ok(text)
        }
        ["get", key] => {
            let known = known_key(key).ok_or_else(|| unknown_key(key))?;
            let value = settings::get(tenant, platform, Section::Config, known.key, known.kind).await?;
            Ok(match value {
                Some(value) => format!("Config {} = {value}", known.key),
                None => format!("No config set for '{}'", known.key),
            })
        }
        ["set", key, value @ ..] if !value.is_empty() => {
            let known = known_key(key).ok_or_else(|| unknown_key(key))?;
            let raw = value.join(" ");
            let normalized = settings::normalize(tenant, platform, known.kind, &raw).await?;
            settings::set(tenant, Section::Config, known.key, Some(&normalized)).await?;
            Ok(format!("Set config {} = {normalized}", known.key))
        }
        ["unset", key] => {
            let known = known_key(key).ok_or_else(|| unknown_key(key))?;
            settings::set(tenant, Section::Config, known.key, None).await?;
            Ok(format!("Cleared config {}", known.key))
        }
        [op, ..] if !matches!(*op, "get" | "set" | "unset") => Err(EngineError::InvalidArgument(
            format!("Unrecognised operation '{op}'"),
        )),
        _ => Err(usage(call.def)),
    }
}

fn unknown_key(key: &str) -> EngineError {
    EngineError::InvalidArgument(format!("Unknown config setting '{key}'"))
}

async fn describe_requirement(call: &Invocation<'_>, requirement: Requirement) -> Result<String, EngineError> {
    let Requirement::Role(id) = requirement else {
        return Ok(requirement.to_string());
    };
    Ok(match call.router.platform.role(call.tenant.id(), id).await? {
        Some(role) => format!("role @{}", role.name),
        None => format!("deleted role {id}"),
    })
}

pub(super) async fn access(call: &Invocation<'_>) -> Result<String, EngineError> {
    let tenant = call.tenant;

    match call.args {
        [] | ["list"] => {
            let mut text = String::from("Command access:");
            for row in access::list(tenant, &command_defaults()).await {
                let requirement = describe_requirement(call, row.requirement).await?;
                let marker = if row.overridden { " (override)" } else { "" };
                text.push_str(&format!("\n* {}: {requirement}{marker}", row.command));
            }
            Ok(text)
        }
        ["set", command, value] => {
            let def = find_command(command)
                .ok_or_else(|| EngineError::not_found(format!("Command '{command}'")))?;
            let requirement = Requirement::parse_override(value).ok_or_else(|| {
                EngineError::InvalidArgument(format!(
                    "'{value}' is not a role, 'public' or 'admin'"
                ))
            })?;
            if let Requirement::Role(id) = requirement {
                ensure_role(call, id).await?;
            }
            access::set_override(tenant, def.name, def.default, Some(requirement)).await?;
            let described = describe_requirement(call, requirement).await?;
            Ok(format!("Access to {} now requires {described}", def.name))
        }
        ["clear", command] => {
            let def = find_command(command)
                .ok_or_else(|| EngineError::not_found(format!("Command '{command}'")))?;
            access::set_override(tenant, def.name, def.default, None).await?;
            Ok(format!(
                "Access to {} reset to its default ({})",
                def.name, def.default
            ))
        }
        _ => Err(usage(call.def)),
    }
}

async fn ensure_role(call: &Invocation<'_>, id: RoleId) -> Result<(), EngineError> {
    match call.router.platform.role(call.tenant.id(), id).await? {
        Some(_) => Ok(()),
        None => Err(EngineError::not_found(format!("Role '{id}'"))),
    }
}

pub(super) async fn autokick(call: &Invocation<'_>) -> Result<String, EngineError> {
    if !call.args.is_empty() {
        return Err(usage(call.def));
    }
    let lines = autokick::preview(call.tenant, &call.router.platform, Utc::now()).await?;
    Ok(lines.join("\n"))
}
