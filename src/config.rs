use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

/// Scheduled broadcast settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DigestConfig {
    /// Chat that receives the scheduled digest. No broadcast when unset.
    #[serde(default)]
    pub target_chat_id: Option<i64>,
    /// Six-field cron expression (seconds first).
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub market: MarketSourceConfig,
    #[serde(default)]
    pub news: NewsSourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketSourceConfig {
    #[serde(default = "default_market_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_market_limit")]
    pub limit: u32,
    #[serde(default = "default_time_period")]
    pub time_period: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsSourceConfig {
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_news_query")]
    pub query: String,
    #[serde(default = "default_news_page_size")]
    pub page_size: u32,
}

fn default_schedule() -> String {
    "0 0 */3 * * *".to_string()
}

fn default_timezone() -> String {
    "Africa/Lagos".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_market_base_url() -> String {
    "https://api.coinranking.com/v2".to_string()
}

fn default_market_limit() -> u32 {
    10
}

fn default_time_period() -> String {
    "3h".to_string()
}

fn default_news_base_url() -> String {
    "https://newsapi.org/v2".to_string()
}

fn default_news_query() -> String {
    "crypto".to_string()
}

fn default_news_page_size() -> u32 {
    10
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            target_chat_id: None,
            schedule: default_schedule(),
            timezone: default_timezone(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            market: MarketSourceConfig::default(),
            news: NewsSourceConfig::default(),
        }
    }
}

impl Default for MarketSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_base_url(),
            api_key: None,
            limit: default_market_limit(),
            time_period: default_time_period(),
        }
    }
}

impl Default for NewsSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_base_url(),
            api_key: None,
            query: default_news_query(),
            page_size: default_news_page_size(),
        }
    }
}

impl DigestConfig {
    /// Parsed schedule timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }
}

impl SourcesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    /// A missing file yields the defaults; the bot token must still come from somewhere.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            info!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    /// Override file values with `BOT_TOKEN`, `TARGET_CHAT_ID`,
    /// `NEWS_API_ORG_KEY` and `COINRANKING_API_KEY` when they are set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(chat) = lookup("TARGET_CHAT_ID") {
            let id = chat
                .trim()
                .parse::<i64>()
                .with_context(|| format!("TARGET_CHAT_ID is not a chat id: {}", chat))?;
            self.digest.target_chat_id = Some(id);
        }
        if let Some(key) = lookup("NEWS_API_ORG_KEY") {
            self.sources.news.api_key = Some(key);
        }
        if let Some(key) = lookup("COINRANKING_API_KEY") {
            self.sources.market.api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Telegram bot token is missing (set [telegram] bot_token or BOT_TOKEN)");
        }
        if self.sources.request_timeout_secs == 0 {
            anyhow::bail!("[sources] request_timeout_secs must be greater than zero");
        }
        self.digest.tz()?;
        Ok(())
    }
}
