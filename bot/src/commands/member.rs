use serde_json::{json, Value};
use tracing::info;

use super::Invocation;
use crate::error::EngineError;
use crate::interval;
use crate::settings::{self, INVITE_COOLDOWN, INVITE_TIMESPAN};
use crate::store::{Document, Filter};

const PING_TABLE: &str = "pingcount";

pub(super) async fn ping(call: &Invocation<'_>) -> Result<String, EngineError> {
    let actor = &call.ctx.actor;
    let filter = Filter::by("uid", actor.id.0);
    let store = call.tenant.store();

    let count = store
        .search(PING_TABLE, &filter)
        .await?
        .first()
        .and_then(|doc| doc.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
        + 1;

    let mut doc = Document::new();
    doc.insert("uid".to_string(), json!(actor.id.0));
    doc.insert("count".to_string(), json!(count));
    store.upsert(PING_TABLE, doc, &filter).await?;

    Ok(format!("{} you have said ping {count} times", actor.display_name))
}

/// Send the invoking member a single-use invite by direct message.
pub(super) async fn invite(call: &Invocation<'_>) -> Result<String, EngineError> {
    let router = call.router;
    let platform = &router.platform;
    let actor = &call.ctx.actor;

    let cooldown = settings::get_interval(call.tenant, platform, INVITE_COOLDOWN)
        .await?
        .unwrap_or(router.config.default_invite_cooldown);
    let timespan = settings::get_interval(call.tenant, platform, INVITE_TIMESPAN)
        .await?
        .unwrap_or(router.config.default_invite_timespan);

    let check = router
        .limiter
        .check_and_record(call.tenant, actor.id, "invite", cooldown.as_secs())
        .await?;
    if !check.allowed {
        return Ok(format!(
            "Sorry {}, you have issued an invite too recently, please wait another {}",
            actor.display_name,
            interval::format(std::time::Duration::from_secs(check.remaining_secs))
        ));
    }

    let url = platform
        .bounded(platform.messenger.create_invite(call.ctx.channel, timespan, 1))
        .await?;
    platform
        .bounded(
            platform
                .messenger
                .send_direct(actor.id, &format!("Here is an invite {url}")),
        )
        .await?;
    info!(tenant = %call.tenant.id(), user = %actor.id, "Invite sent");

    Ok(format!("Invite sent to {}", actor.display_name))
}
