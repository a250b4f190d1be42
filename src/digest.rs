use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::debug;

use crate::config::SourcesConfig;
use crate::sources::market::MarketClient;
use crate::sources::news::NewsClient;
use crate::sources::DigestSource;

/// Placed between fragments of a digest.
pub const SEPARATOR: &str = "\n\n";

/// One combined summary: a fragment per configured source, in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    fragments: Vec<String>,
}

impl Digest {
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn text(&self) -> String {
        self.fragments.join(SEPARATOR)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Fans out to every source at once and merges whatever comes back.
pub struct Aggregator {
    sources: Vec<Arc<dyn DigestSource>>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn DigestSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Market prices first, then news, sharing one HTTP client.
    pub fn from_config(config: &SourcesConfig) -> Self {
        let client = reqwest::Client::new();
        let sources: Vec<Arc<dyn DigestSource>> = vec![
            Arc::new(MarketClient::new(client.clone(), config.market.clone())),
            Arc::new(NewsClient::new(client, config.news.clone())),
        ];
        Self::new(sources, config.request_timeout())
    }

    /// Wait for every source, successful or not. A failed source only
    /// degrades its own fragment; this never fails.
    pub async fn aggregate(&self) -> Digest {
        let started = Instant::now();
        let fragments = join_all(
            self.sources
                .iter()
                .map(|source| source.fragment(self.timeout)),
        )
        .await;
        debug!(
            "Digest built from {} sources in {}ms",
            fragments.len(),
            started.elapsed().as_millis()
        );
        Digest { fragments }
    }
}
