use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode,
};
use teloxide::update_listeners::Polling;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::{Outbox, Transport};
use crate::content;
use crate::dispatch::admin::MembershipLookup;
use crate::dispatch::{
    Dispatcher as EventDispatcher, InboundEvent, MemberProfile, OutboundAction,
};
use crate::formatting::split_message;
use crate::router::{Control, ResponsePayload};

/// Stay under Telegram's 4096 char limit.
const MAX_MESSAGE_LEN: usize = 4000;

/// Everything the update handlers need.
pub struct BotState {
    pub dispatcher: EventDispatcher,
    pub outbox: Arc<Outbox>,
}

/// teloxide-backed [`Transport`] and [`MembershipLookup`].
pub struct TelegramTransport {
    bot: Bot,
    shutdown: Arc<Notify>,
}

impl TelegramTransport {
    pub fn new(bot: Bot, shutdown: Arc<Notify>) -> Self {
        Self { bot, shutdown }
    }
}

fn keyboard(controls: &[Vec<Control>]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = controls
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|control| match control {
                    Control::Url { label, url } => match reqwest::Url::parse(url) {
                        Ok(url) => Some(InlineKeyboardButton::url(label.clone(), url)),
                        Err(e) => {
                            warn!("Skipping button '{}' with invalid url {}: {}", label, url, e);
                            None
                        }
                    },
                    Control::Callback { label, data } => {
                        Some(InlineKeyboardButton::callback(label.clone(), data.clone()))
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    if rows.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(rows))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat: i64, payload: &ResponsePayload) -> Result<()> {
        let chunks = split_message(&payload.text, MAX_MESSAGE_LEN);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut request = self
                .bot
                .send_message(ChatId(chat), chunk)
                .parse_mode(ParseMode::Html);
            // Buttons go under the final chunk.
            if i == last {
                if let Some(markup) = keyboard(&payload.controls) {
                    request = request.reply_markup(markup);
                }
            }
            request
                .await
                .with_context(|| format!("sendMessage to chat {} failed", chat))?;
        }
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<()> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(query_id.to_string()));
        if let Some(text) = text {
            request = request.text(text);
        }
        request.await.context("answerCallbackQuery failed")?;
        Ok(())
    }

    async fn ban_member(&self, chat: i64, user: u64) -> Result<()> {
        self.bot
            .ban_chat_member(ChatId(chat), UserId(user))
            .await
            .with_context(|| format!("banChatMember {} in {} failed", user, chat))?;
        Ok(())
    }

    fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[async_trait]
impl MembershipLookup for TelegramTransport {
    async fn is_admin(&self, chat: i64, user: u64) -> Result<bool> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat), UserId(user))
            .await
            .with_context(|| format!("getChatMember {} in {} failed", user, chat))?;
        Ok(member.is_privileged())
    }
}

/// Turn a Telegram message into the events it carries.
fn message_events(msg: &Message) -> Vec<InboundEvent> {
    let chat = msg.chat.id.0;

    if let Some(members) = msg.new_chat_members() {
        return members
            .iter()
            .map(|user| InboundEvent::NewMember {
                chat,
                profile: MemberProfile {
                    id: user.id.0,
                    first_name: user.first_name.clone(),
                    username: user.username.clone(),
                },
            })
            .collect();
    }

    let Some(text) = msg.text() else {
        return Vec::new();
    };
    let from = msg.from.as_ref().map(|user| user.id.0);
    let reply_to = msg
        .reply_to_message()
        .filter(|replied| !is_topic_root(msg, replied))
        .and_then(|replied| replied.from.as_ref())
        .map(|user| user.id.0);

    vec![InboundEvent::from_text(chat, from, text, reply_to)]
}

/// Forum topic messages carry the topic's opening message as their reply
/// target even when the user replied to nothing.
fn is_topic_root(msg: &Message, replied: &Message) -> bool {
    replied.forum_topic_created().is_some()
        || (msg.is_topic_message && msg.thread_id.map(|thread| thread.0) == Some(replied.id))
}

fn callback_event(query: &CallbackQuery) -> Option<InboundEvent> {
    let id = query.data.clone()?;
    // Fall back to the user's private chat when the source message is gone.
    let chat = query
        .message
        .as_ref()
        .map(|m| m.chat().id.0)
        .unwrap_or(query.from.id.0 as i64);
    Some(InboundEvent::CallbackAction {
        chat,
        from: query.from.id.0,
        id,
        query_id: query.id.0.clone(),
    })
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let started = Instant::now();
    for event in message_events(&msg) {
        let actions = state.dispatcher.dispatch(event).await;
        state.outbox.execute(actions).await;
    }
    debug!("Response time: {}ms", started.elapsed().as_millis());
    Ok(())
}

async fn handle_callback(query: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let started = Instant::now();
    match callback_event(&query) {
        Some(event) => {
            let actions = state.dispatcher.dispatch(event).await;
            state.outbox.execute(actions).await;
        }
        None => {
            debug!("Callback query without data, acknowledging");
            state
                .outbox
                .execute(vec![OutboundAction::AnswerCallback {
                    query_id: query.id.0.clone(),
                    text: None,
                }])
                .await;
        }
    }
    debug!("Response time: {}ms", started.elapsed().as_millis());
    Ok(())
}

fn menu_commands() -> Vec<BotCommand> {
    content::listed_commands()
        .map(|cmd| BotCommand::new(cmd.name, cmd.description))
        .collect()
}

async fn register_commands(bot: &Bot) {
    let commands = menu_commands();
    let count = commands.len();
    match bot.set_my_commands(commands).await {
        Ok(_) => info!("Registered {} bot commands", count),
        Err(e) => warn!("Failed to register bot commands: {}", e),
    }
}

/// Keep calling `attempt` until it yields a future, then await it.
/// `attempt` fails while the dispatcher has not started polling yet.
async fn shutdown_when_running<F, Fut, E>(mut attempt: F, tries: u32, pause: Duration) -> bool
where
    F: FnMut() -> std::result::Result<Fut, E>,
    Fut: std::future::Future<Output = ()>,
{
    for _ in 0..tries {
        match attempt() {
            Ok(stopped) => {
                stopped.await;
                return true;
            }
            Err(_) => tokio::time::sleep(pause).await,
        }
    }
    false
}

/// Resolves on SIGINT, SIGTERM, or an admin `/shutdown`.
async fn wait_for_shutdown(requested: Arc<Notify>) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received, stopping bot..."),
        _ = terminate => info!("SIGTERM received, stopping bot..."),
        _ = requested.notified() => info!("Shutdown command received, stopping bot..."),
    }
}

/// Run the Telegram bot until a shutdown signal arrives.
pub async fn run(bot: Bot, state: Arc<BotState>, shutdown: Arc<Notify>) -> Result<()> {
    info!("Starting Telegram platform...");
    register_commands(&bot).await;

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    let listener = Polling::builder(bot.clone())
        .drop_pending_updates()
        .build();

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        wait_for_shutdown(shutdown).await;
        // A signal can land before polling starts; retry until it is running.
        if !shutdown_when_running(|| token.shutdown(), 100, Duration::from_millis(100)).await {
            warn!("Telegram dispatcher never started, could not stop it");
        }
    });

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("telegram update listener"),
        )
        .await;

    info!("Telegram platform stopped");
    Ok(())
}
