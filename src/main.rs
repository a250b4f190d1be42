mod config;
mod content;
mod digest;
mod dispatch;
mod formatting;
mod platform;
mod router;
mod scheduler;
mod sources;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::digest::Aggregator;
use crate::dispatch::Dispatcher;
use crate::platform::telegram::{self, BotState, TelegramTransport};
use crate::platform::Outbox;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,digestbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Target chat: {:?}", config.digest.target_chat_id);
    info!(
        "  Schedule: {} ({})",
        config.digest.schedule, config.digest.timezone
    );
    info!("  Fetch timeout: {}s", config.sources.request_timeout_secs);
    if config.sources.news.api_key.is_none() {
        warn!("  NewsAPI key is not set, news will be unavailable");
    }

    let bot = Bot::new(&config.telegram.bot_token);
    let shutdown = Arc::new(Notify::new());
    let transport = Arc::new(TelegramTransport::new(bot.clone(), shutdown.clone()));

    let aggregator = Arc::new(Aggregator::from_config(&config.sources));
    let outbox = Arc::new(Outbox::new(transport.clone(), aggregator));
    let dispatcher = Dispatcher::new(content::keyword_table(), transport);

    // Scheduled digest broadcast
    let mut scheduler = Scheduler::new().await?;
    scheduler::tasks::register_builtin_tasks(&scheduler, &config.digest, outbox.clone()).await?;
    scheduler.start().await?;

    let state = Arc::new(BotState { dispatcher, outbox });

    info!("Bot is starting...");
    let result = telegram::run(bot, state, shutdown).await;

    if let Err(e) = scheduler.shutdown().await {
        warn!("{:#}", e);
    }
    result
}
