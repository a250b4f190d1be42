pub mod telegram;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::content;
use crate::digest::Aggregator;
use crate::dispatch::OutboundAction;
use crate::router::ResponsePayload;

/// Outbound operations a chat platform must provide.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an HTML message, attaching the payload's buttons when present.
    async fn send_message(&self, chat: i64, payload: &ResponsePayload) -> Result<()>;

    /// Acknowledge a pressed inline button, optionally with a toast.
    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<()>;

    async fn ban_member(&self, chat: i64, user: u64) -> Result<()>;

    /// Ask the running session to stop.
    fn request_shutdown(&self);
}

/// Performs the actions the dispatcher decided on. Transport failures are
/// logged and dropped; nothing here is retried.
pub struct Outbox {
    transport: Arc<dyn Transport>,
    aggregator: Arc<Aggregator>,
}

impl Outbox {
    pub fn new(transport: Arc<dyn Transport>, aggregator: Arc<Aggregator>) -> Self {
        Self {
            transport,
            aggregator,
        }
    }

    /// Run actions in order.
    pub async fn execute(&self, actions: Vec<OutboundAction>) {
        for action in actions {
            self.perform(action).await;
        }
    }

    /// Aggregate all sources and send the digest to `chat`.
    pub async fn send_digest(&self, chat: i64) -> bool {
        let digest = self.aggregator.aggregate().await;
        debug!(chat, fragments = digest.fragments().len(), "Sending digest");
        self.send(chat, &ResponsePayload::text(digest.text())).await
    }

    async fn perform(&self, action: OutboundAction) {
        match action {
            OutboundAction::Reply { chat, payload } => {
                self.send(chat, &payload).await;
            }
            OutboundAction::AnswerCallback { query_id, text } => {
                if let Err(e) = self
                    .transport
                    .answer_callback(&query_id, text.as_deref())
                    .await
                {
                    warn!("Failed to answer callback query {}: {:#}", query_id, e);
                }
            }
            OutboundAction::SendDigest { chat } => {
                self.send_digest(chat).await;
            }
            OutboundAction::BanMember { chat, user } => {
                match self.transport.ban_member(chat, user).await {
                    Ok(()) => {
                        info!(chat, user, "Banned member");
                        self.send(chat, &ResponsePayload::text(content::BAN_DONE))
                            .await;
                    }
                    Err(e) => {
                        error!(chat, user, "Failed to ban member: {:#}", e);
                        self.send(chat, &ResponsePayload::text(content::BAN_FAILED))
                            .await;
                    }
                }
            }
            OutboundAction::Shutdown => {
                info!("Shutdown requested");
                self.transport.request_shutdown();
            }
        }
    }

    async fn send(&self, chat: i64, payload: &ResponsePayload) -> bool {
        match self.transport.send_message(chat, payload).await {
            Ok(()) => true,
            Err(e) => {
                error!(chat, "Failed to send message: {:#}", e);
                false
            }
        }
    }
}
