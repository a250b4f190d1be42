use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::DigestConfig;
use crate::platform::Outbox;
use crate::scheduler::Scheduler;

/// Build one digest and send it to the broadcast chat.
async fn broadcast_digest(outbox: Arc<Outbox>, chat: i64) {
    if outbox.send_digest(chat).await {
        info!(chat, "Crypto update sent via cron");
    } else {
        error!(chat, "Scheduled crypto update was not delivered");
    }
}

/// Register built-in background tasks. Returns whether the digest
/// broadcast was scheduled.
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    digest: &DigestConfig,
    outbox: Arc<Outbox>,
) -> anyhow::Result<bool> {
    let Some(chat) = digest.target_chat_id else {
        warn!("No target chat configured, scheduled crypto updates are disabled");
        return Ok(false);
    };
    let tz = digest.tz()?;

    scheduler
        .add_cron_job(&digest.schedule, tz, "crypto-digest", move || {
            Box::pin(broadcast_digest(outbox.clone(), chat))
        })
        .await?;

    Ok(true)
}
