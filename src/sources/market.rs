use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Source, SourceResult};
use crate::config::MarketSourceConfig;
use crate::formatting::{escape_html, format_usd_str, group_thousands};

pub const PRICES_UNAVAILABLE: &str = "⚠️ Failed to retrieve crypto prices.";
pub const PRICES_EMPTY: &str = "Could not retrieve cryptocurrency data at this time.";

#[derive(Debug, Deserialize)]
struct CoinRankingResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<MarketData>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MarketData {
    #[serde(default)]
    pub stats: Option<MarketStats>,
    #[serde(default)]
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    #[serde(default)]
    pub total_coins: u64,
    #[serde(default)]
    pub total_market_cap: Option<String>,
    #[serde(default, rename = "total24hVolume")]
    pub total_24h_volume: Option<String>,
}

/// One ranked asset. Prices and changes arrive as decimal strings and may be null.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Coin {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub change: Option<String>,
}

/// Ranked coins for a given change window.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub time_period: String,
    pub data: MarketData,
}

/// CoinRanking client. The API key is optional.
pub struct MarketClient {
    client: reqwest::Client,
    config: MarketSourceConfig,
}

impl MarketClient {
    pub fn new(client: reqwest::Client, config: MarketSourceConfig) -> Self {
        Self { client, config }
    }

    fn coins_url(&self) -> String {
        format!("{}/coins", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self) -> Result<MarketSnapshot> {
        let url = self.coins_url();
        debug!("Fetching market data: {}", url);

        let mut request = self.client.get(&url).query(&[
            ("limit", self.config.limit.to_string()),
            ("timePeriod", self.config.time_period.clone()),
        ]);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.header("x-access-token", key);
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to CoinRanking")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("CoinRanking API error ({}): {}", status, body);
        }

        let body: CoinRankingResponse = response
            .json()
            .await
            .context("Failed to parse CoinRanking response")?;

        if body.status != "success" {
            anyhow::bail!(
                "CoinRanking API returned status: {} {}",
                body.status,
                body.message.unwrap_or_default()
            );
        }

        Ok(MarketSnapshot {
            time_period: self.config.time_period.clone(),
            data: body.data.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Source for MarketClient {
    type Payload = MarketSnapshot;

    fn name(&self) -> &str {
        "market"
    }

    async fn fetch(&self) -> SourceResult<MarketSnapshot> {
        self.request().await.map_err(|e| format!("{:#}", e))
    }

    fn format(&self, result: &SourceResult<MarketSnapshot>) -> String {
        format_market(result)
    }
}

fn change_marker(change: f64) -> &'static str {
    if change > 0.0 {
        "📈"
    } else if change < 0.0 {
        "📉"
    } else {
        "➡️"
    }
}

fn parse_change(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Render a market snapshot as an HTML digest fragment.
pub fn format_market(result: &SourceResult<MarketSnapshot>) -> String {
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(_) => return PRICES_UNAVAILABLE.to_string(),
    };
    if snapshot.data.coins.is_empty() {
        return PRICES_EMPTY.to_string();
    }

    let mut message = format!(
        "<b>📊 Top {} Crypto Updates (Last {}):</b>\n\n",
        snapshot.data.coins.len(),
        escape_html(&snapshot.time_period)
    );

    for coin in &snapshot.data.coins {
        let change = parse_change(coin.change.as_deref());
        // -0.0 prints as "-0"
        let change = if change == 0.0 { 0.0 } else { change };
        message.push_str(&format!(
            "<b>{} ({})</b>\n",
            escape_html(&coin.name),
            escape_html(&coin.symbol)
        ));
        message.push_str(&format!(
            "  Price: {}\n",
            format_usd_str(coin.price.as_deref())
        ));
        message.push_str(&format!(
            "  Change: {} {}%\n\n",
            change_marker(change),
            change
        ));
    }

    if let Some(stats) = &snapshot.data.stats {
        message.push_str("<b>Market Stats:</b>\n");
        message.push_str(&format!(
            "  Total Coins: {}\n",
            group_thousands(stats.total_coins)
        ));
        message.push_str(&format!(
            "  Total Market Cap: {}\n",
            format_usd_str(stats.total_market_cap.as_deref())
        ));
        message.push_str(&format!(
            "  Total 24h Vol: {}",
            format_usd_str(stats.total_24h_volume.as_deref())
        ));
    }

    message.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coin(name: &str, symbol: &str, price: &str, change: Option<&str>) -> Coin {
        Coin {
            name: name.to_string(),
            symbol: symbol.to_string(),
            price: Some(price.to_string()),
            change: change.map(String::from),
        }
    }

    fn snapshot(coins: Vec<Coin>) -> MarketSnapshot {
        MarketSnapshot {
            time_period: "3h".to_string(),
            data: MarketData {
                stats: Some(MarketStats {
                    total_coins: 38412,
                    total_market_cap: Some("2412345678901".to_string()),
                    total_24h_volume: Some("98765432100.5".to_string()),
                }),
                coins,
            },
        }
    }

    fn config(base_url: &str, api_key: Option<&str>) -> MarketSourceConfig {
        MarketSourceConfig {
            base_url: base_url.to_string(),
            api_key: api_key.map(String::from),
            limit: 10,
            time_period: "3h".to_string(),
        }
    }

    // ── Formatter ──

    #[test]
    fn test_format_err_is_placeholder() {
        let out = format_market(&Err("connection refused".to_string()));
        assert_eq!(out, PRICES_UNAVAILABLE);
    }

    #[test]
    fn test_format_zero_coins() {
        let out = format_market(&Ok(snapshot(vec![])));
        assert_eq!(out, PRICES_EMPTY);
    }

    #[test]
    fn test_format_change_markers() {
        let out = format_market(&Ok(snapshot(vec![
            coin("Bitcoin", "BTC", "67123.456", Some("1.23")),
            coin("Ethereum", "ETH", "3456.7", Some("-0.50")),
            coin("Tether USD", "USDT", "1.0001", Some("0.00")),
            coin("Mystery", "MYS", "0.5", None),
        ])));

        assert!(out.starts_with("<b>📊 Top 4 Crypto Updates (Last 3h):</b>\n\n"));
        assert!(out.contains("<b>Bitcoin (BTC)</b>\n  Price: $67,123.46\n  Change: 📈 1.23%"));
        assert!(out.contains("<b>Ethereum (ETH)</b>\n  Price: $3,456.70\n  Change: 📉 -0.5%"));
        assert!(out.contains("<b>Tether USD (USDT)</b>\n  Price: $1.00\n  Change: ➡️ 0%"));
        assert!(out.contains("<b>Mystery (MYS)</b>\n  Price: $0.50\n  Change: ➡️ 0%"));
    }

    #[test]
    fn test_format_market_stats() {
        let out = format_market(&Ok(snapshot(vec![coin("Bitcoin", "BTC", "1", Some("1"))])));
        assert!(out.contains("<b>Market Stats:</b>\n"));
        assert!(out.contains("  Total Coins: 38,412\n"));
        assert!(out.contains("  Total Market Cap: $2,412,345,678,901.00\n"));
        assert!(out.ends_with("  Total 24h Vol: $98,765,432,100.50"));
    }

    #[test]
    fn test_format_escapes_names() {
        let out = format_market(&Ok(snapshot(vec![coin("A<B>", "A&B", "1", Some("1"))])));
        assert!(out.contains("<b>A&lt;B&gt; (A&amp;B)</b>"));
    }

    // ── Client ──

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins"))
            .and(query_param("limit", "10"))
            .and(query_param("timePeriod", "3h"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {
                    "stats": {
                        "total": 38412,
                        "totalCoins": 38412,
                        "totalMarketCap": "2412345678901",
                        "total24hVolume": "98765432100"
                    },
                    "coins": [
                        {"uuid": "Qwsogvtv82FCd", "symbol": "BTC", "name": "Bitcoin", "price": "67000.1", "change": "1.2"},
                        {"uuid": "razxDUgYGNAdQ", "symbol": "ETH", "name": "Ethereum", "price": "3400", "change": null}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketClient::new(reqwest::Client::new(), config(&server.uri(), None));
        let snapshot = client.fetch().await.unwrap();
        assert_eq!(snapshot.time_period, "3h");
        assert_eq!(snapshot.data.coins.len(), 2);
        assert_eq!(snapshot.data.coins[1].change, None);
        assert_eq!(snapshot.data.stats.unwrap().total_coins, 38412);
    }

    #[tokio::test]
    async fn test_fetch_sends_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins"))
            .and(header("x-access-token", "cr-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"coins": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketClient::new(
            reqwest::Client::new(),
            config(&server.uri(), Some("cr-secret")),
        );
        let snapshot = client.fetch().await.unwrap();
        assert!(snapshot.data.coins.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "fail",
                "message": "Rate limit reached"
            })))
            .mount(&server)
            .await;

        let client = MarketClient::new(reqwest::Client::new(), config(&server.uri(), None));
        let reason = client.fetch().await.unwrap_err();
        assert!(reason.contains("status: fail"));
        assert!(reason.contains("Rate limit reached"));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = MarketClient::new(reqwest::Client::new(), config(&server.uri(), None));
        let reason = client.fetch().await.unwrap_err();
        assert!(reason.contains("503"));
        assert!(reason.contains("maintenance"));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = MarketClient::new(reqwest::Client::new(), config(&server.uri(), None));
        let reason = client.fetch().await.unwrap_err();
        assert!(reason.contains("Failed to parse CoinRanking response"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let client = MarketClient::new(
            reqwest::Client::new(),
            config("http://127.0.0.1:9", None),
        );
        let reason = client.fetch().await.unwrap_err();
        assert!(reason.contains("Failed to send request to CoinRanking"));
    }
}
