pub mod admin;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::content::{self, CommandKind};
use crate::router::{KeywordTable, ResponsePayload};
use admin::{authorize, AdminCheck, MembershipLookup};

/// A user who just joined a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    pub id: u64,
    pub first_name: String,
    pub username: Option<String>,
}

/// One update from the transport, consumed once by [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    TextMessage {
        chat: i64,
        from: Option<u64>,
        text: String,
    },
    Command {
        chat: i64,
        from: Option<u64>,
        name: String,
        /// Author of the message this command replied to.
        reply_to: Option<u64>,
    },
    CallbackAction {
        chat: i64,
        from: u64,
        id: String,
        query_id: String,
    },
    NewMember {
        chat: i64,
        profile: MemberProfile,
    },
}

impl InboundEvent {
    /// Known `/commands` become [`InboundEvent::Command`]; anything else,
    /// unknown commands included, is plain text for the keyword router.
    pub fn from_text(chat: i64, from: Option<u64>, text: &str, reply_to: Option<u64>) -> Self {
        match parse_command(text).and_then(content::find_command) {
            Some(spec) => InboundEvent::Command {
                chat,
                from,
                name: spec.name.to_string(),
                reply_to,
            },
            None => InboundEvent::TextMessage {
                chat,
                from,
                text: text.to_string(),
            },
        }
    }
}

/// `/name@bot args` → `name`.
pub fn parse_command(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// What a handler decided to do. Performed later by the outbound executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    Reply {
        chat: i64,
        payload: Arc<ResponsePayload>,
    },
    AnswerCallback {
        query_id: String,
        text: Option<String>,
    },
    /// Build a fresh digest and send it to `chat`.
    SendDigest {
        chat: i64,
    },
    BanMember {
        chat: i64,
        user: u64,
    },
    Shutdown,
}

fn reply(chat: i64, payload: ResponsePayload) -> OutboundAction {
    OutboundAction::Reply {
        chat,
        payload: Arc::new(payload),
    }
}

fn reply_text(chat: i64, text: &str) -> OutboundAction {
    reply(chat, ResponsePayload::text(text))
}

/// Maps each inbound event to exactly one handler path.
pub struct Dispatcher {
    keywords: KeywordTable,
    membership: Arc<dyn MembershipLookup>,
}

impl Dispatcher {
    pub fn new(keywords: KeywordTable, membership: Arc<dyn MembershipLookup>) -> Self {
        if keywords.is_empty() {
            warn!("Keyword table is empty, plain text will go unanswered");
        } else {
            info!(
                "Keyword router loaded {} keywords: {}",
                keywords.len(),
                keywords.keywords().collect::<Vec<_>>().join(", ")
            );
        }
        Self {
            keywords,
            membership,
        }
    }

    /// Decide the actions for one event. An empty list is a silent miss.
    pub async fn dispatch(&self, event: InboundEvent) -> Vec<OutboundAction> {
        match event {
            InboundEvent::Command {
                chat,
                from,
                name,
                reply_to,
            } => self.on_command(chat, from, &name, reply_to).await,
            InboundEvent::CallbackAction {
                chat,
                from,
                id,
                query_id,
            } => {
                debug!(chat, user = from, "Callback action '{}'", id);
                self.on_action(chat, &id, query_id)
            }
            InboundEvent::TextMessage { chat, from, text } => {
                debug!(chat, user = ?from, "Text message ({} chars)", text.len());
                self.on_text(chat, &text)
            }
            InboundEvent::NewMember { chat, profile } => {
                info!(
                    chat,
                    user = profile.id,
                    username = ?profile.username,
                    "New member: {}",
                    profile.first_name
                );
                vec![
                    reply(chat, content::welcome(&profile.first_name)),
                    reply(chat, content::intro()),
                ]
            }
        }
    }

    async fn on_command(
        &self,
        chat: i64,
        from: Option<u64>,
        name: &str,
        reply_to: Option<u64>,
    ) -> Vec<OutboundAction> {
        let Some(spec) = content::find_command(name) else {
            debug!("Unknown command /{}", name);
            return Vec::new();
        };

        if spec.admin_only {
            let Some(user) = from else {
                return vec![reply_text(chat, content::UNABLE_TO_VERIFY)];
            };
            let check = authorize(self.membership.as_ref(), chat, user).await;
            if !check.is_admin() {
                let denial = match check {
                    AdminCheck::LookupFailed(_) => content::PERMISSION_ERROR,
                    _ => content::NOT_AUTHORIZED,
                };
                return vec![reply_text(chat, denial)];
            }
        }

        info!(chat, user = ?from, "Command /{}", spec.name);
        match spec.kind {
            CommandKind::Start => vec![reply_text(chat, content::START_TEXT)],
            CommandKind::Help => vec![reply(chat, ResponsePayload::text(content::help_text()))],
            CommandKind::Faq => vec![reply_text(chat, content::FAQ_TEXT)],
            CommandKind::CryptoUpdates => vec![
                reply_text(chat, content::FETCHING_TEXT),
                OutboundAction::SendDigest { chat },
            ],
            CommandKind::Ban => match reply_to {
                Some(user) => vec![OutboundAction::BanMember { chat, user }],
                None => vec![reply_text(chat, content::BAN_USAGE)],
            },
            CommandKind::Shutdown => vec![
                reply_text(chat, content::SHUTDOWN_TEXT),
                OutboundAction::Shutdown,
            ],
        }
    }

    fn on_action(&self, chat: i64, id: &str, query_id: String) -> Vec<OutboundAction> {
        let Some(kind) = content::find_action(id) else {
            debug!("Unknown callback action '{}'", id);
            return vec![OutboundAction::AnswerCallback {
                query_id,
                text: None,
            }];
        };

        let (toast, payload) = content::action_response(kind);
        vec![
            OutboundAction::AnswerCallback {
                query_id,
                text: toast.map(String::from),
            },
            reply(chat, payload),
        ]
    }

    fn on_text(&self, chat: i64, text: &str) -> Vec<OutboundAction> {
        match self.keywords.route(text) {
            Some(payload) => vec![OutboundAction::Reply { chat, payload }],
            None => Vec::new(),
        }
    }
}
