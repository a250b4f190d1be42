use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Source, SourceResult};
use crate::config::NewsSourceConfig;
use crate::formatting::escape_html;

pub const NEWS_UNAVAILABLE: &str = "⚠️ Failed to retrieve crypto news.";
pub const NEWS_EMPTY: &str = "Could not retrieve cryptocurrency news at this time.";
pub const MISSING_KEY: &str = "NewsAPI key is missing";
/// Reasons starting with this came from a NewsAPI error body and are shown to users.
pub const API_ERROR_PREFIX: &str = "API Error: ";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Article {
    #[serde(default)]
    pub source: ArticleSource,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ArticleSource {
    #[serde(default)]
    pub name: Option<String>,
}

/// NewsAPI `everything` search client. Requires an API key.
pub struct NewsClient {
    client: reqwest::Client,
    config: NewsSourceConfig,
}

impl NewsClient {
    pub fn new(client: reqwest::Client, config: NewsSourceConfig) -> Self {
        Self { client, config }
    }

    fn everything_url(&self) -> String {
        format!("{}/everything", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self, api_key: &str) -> Result<Vec<Article>> {
        let url = self.everything_url();
        debug!("Fetching news: {} (q={})", url, self.config.query);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", self.config.query.clone()),
                ("pageSize", self.config.page_size.to_string()),
                ("apiKey", api_key.to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to NewsAPI")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read NewsAPI response")?;

        // NewsAPI reports failures as {"status": "error", "message": ...} with a 4xx code.
        let body: NewsApiResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                anyhow::bail!("NewsAPI error ({}): {}", status, text)
            }
            Err(e) => return Err(e).context("Failed to parse NewsAPI response"),
        };

        if body.status != "ok" {
            anyhow::bail!(
                "{}{}",
                API_ERROR_PREFIX,
                body.message.as_deref().unwrap_or("Unknown")
            );
        }
        if !status.is_success() {
            anyhow::bail!("NewsAPI error ({})", status);
        }

        Ok(body.articles)
    }
}

#[async_trait]
impl Source for NewsClient {
    type Payload = Vec<Article>;

    fn name(&self) -> &str {
        "news"
    }

    async fn fetch(&self) -> SourceResult<Vec<Article>> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(MISSING_KEY.to_string());
        };
        self.request(api_key).await.map_err(|e| format!("{:#}", e))
    }

    fn format(&self, result: &SourceResult<Vec<Article>>) -> String {
        format_news(result)
    }
}

/// Render news articles as a numbered HTML list.
///
/// A NewsAPI error body keeps the provider's message; any other failure
/// becomes the generic placeholder.
pub fn format_news(result: &SourceResult<Vec<Article>>) -> String {
    let articles = match result {
        Ok(articles) => articles,
        Err(reason) if reason.starts_with(API_ERROR_PREFIX) => {
            return format!("{} ({})", NEWS_EMPTY, escape_html(reason));
        }
        Err(_) => return NEWS_UNAVAILABLE.to_string(),
    };
    if articles.is_empty() {
        return NEWS_EMPTY.to_string();
    }

    let mut message = String::from("<b>📰 Latest Crypto News:</b>\n\n");
    for (index, article) in articles.iter().enumerate() {
        let title = escape_html(article.title.as_deref().unwrap_or("Untitled"));
        match article.url.as_deref() {
            Some(url) => message.push_str(&format!(
                "{}. <a href=\"{}\">{}</a>\n",
                index + 1,
                escape_html(url),
                title
            )),
            None => message.push_str(&format!("{}. {}\n", index + 1, title)),
        }
        message.push_str(&format!(
            "   <i>Source: {}</i>\n\n",
            escape_html(article.source.name.as_deref().unwrap_or("Unknown"))
        ));
    }

    message.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article(title: &str, url: &str, source: &str) -> Article {
        Article {
            source: ArticleSource {
                name: Some(source.to_string()),
            },
            title: Some(title.to_string()),
            url: Some(url.to_string()),
        }
    }

    fn config(base_url: &str, api_key: Option<&str>) -> NewsSourceConfig {
        NewsSourceConfig {
            base_url: base_url.to_string(),
            api_key: api_key.map(String::from),
            query: "crypto".to_string(),
            page_size: 10,
        }
    }

    // ── Formatter ──

    #[test]
    fn test_format_err_is_placeholder() {
        assert_eq!(format_news(&Err(MISSING_KEY.to_string())), NEWS_UNAVAILABLE);
    }

    #[test]
    fn test_format_transport_failure_is_placeholder() {
        let reason = "Failed to send request to NewsAPI: connection refused".to_string();
        assert_eq!(format_news(&Err(reason)), NEWS_UNAVAILABLE);
        assert_eq!(
            format_news(&Err("timed out after 15s".to_string())),
            NEWS_UNAVAILABLE
        );
    }

    #[test]
    fn test_format_api_error_keeps_provider_message() {
        let reason = "API Error: You have made too many requests".to_string();
        assert_eq!(
            format_news(&Err(reason)),
            "Could not retrieve cryptocurrency news at this time. \
             (API Error: You have made too many requests)"
        );
    }

    #[test]
    fn test_format_api_error_is_escaped() {
        let out = format_news(&Err("API Error: key <redacted> & expired".to_string()));
        assert!(out.ends_with("(API Error: key &lt;redacted&gt; &amp; expired)"));
    }

    #[test]
    fn test_format_zero_articles() {
        assert_eq!(format_news(&Ok(vec![])), NEWS_EMPTY);
    }

    #[test]
    fn test_format_numbered_links() {
        let out = format_news(&Ok(vec![
            article("Bitcoin tops $70k", "https://example.com/a", "CoinDesk"),
            article("ETF inflows & outflows", "https://example.com/b?x=1&y=2", "Decrypt"),
        ]));
        assert_eq!(
            out,
            "<b>📰 Latest Crypto News:</b>\n\n\
             1. <a href=\"https://example.com/a\">Bitcoin tops $70k</a>\n   <i>Source: CoinDesk</i>\n\n\
             2. <a href=\"https://example.com/b?x=1&amp;y=2\">ETF inflows &amp; outflows</a>\n   <i>Source: Decrypt</i>"
        );
    }

    #[test]
    fn test_format_missing_fields() {
        let out = format_news(&Ok(vec![Article::default()]));
        assert!(out.contains("1. Untitled\n   <i>Source: Unknown</i>"));
    }

    // ── Client ──

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = NewsClient::new(reqwest::Client::new(), config(&server.uri(), None));
        assert_eq!(client.fetch().await, Err(MISSING_KEY.to_string()));

        let client = NewsClient::new(reqwest::Client::new(), config(&server.uri(), Some("")));
        assert_eq!(client.fetch().await, Err(MISSING_KEY.to_string()));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .and(query_param("q", "crypto"))
            .and(query_param("pageSize", "10"))
            .and(query_param("apiKey", "news-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "totalResults": 1,
                "articles": [{
                    "source": {"id": null, "name": "CoinDesk"},
                    "author": "Jane",
                    "title": "Markets rally",
                    "url": "https://example.com/rally",
                    "publishedAt": "2026-10-17T09:00:00Z"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = NewsClient::new(
            reqwest::Client::new(),
            config(&server.uri(), Some("news-key")),
        );
        let articles = client.fetch().await.unwrap();
        assert_eq!(
            articles,
            vec![article("Markets rally", "https://example.com/rally", "CoinDesk")]
        );
    }

    #[tokio::test]
    async fn test_fetch_api_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "status": "error",
                "code": "apiKeyInvalid",
                "message": "Your API key is invalid or incorrect."
            })))
            .mount(&server)
            .await;

        let client = NewsClient::new(reqwest::Client::new(), config(&server.uri(), Some("bad")));
        let reason = client.fetch().await.unwrap_err();
        assert_eq!(reason, "API Error: Your API key is invalid or incorrect.");
        assert_eq!(
            client.format(&Err(reason)),
            "Could not retrieve cryptocurrency news at this time. \
             (API Error: Your API key is invalid or incorrect.)"
        );
    }

    #[tokio::test]
    async fn test_fetch_http_error_without_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = NewsClient::new(reqwest::Client::new(), config(&server.uri(), Some("k")));
        let reason = client.fetch().await.unwrap_err();
        assert!(reason.contains("502"));
        assert!(reason.contains("bad gateway"));
    }
}
