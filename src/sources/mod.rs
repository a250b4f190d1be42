pub mod market;
pub mod news;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Outcome of one fetch: the provider's payload, or a short diagnostic reason.
pub type SourceResult<T> = Result<T, String>;

/// An external data provider paired with the formatter for its payload.
///
/// `fetch` must never panic or propagate an error: transport failures,
/// bad statuses and missing credentials all come back as `Err(reason)`.
/// `format` is pure and defined for every result, including `Err`.
#[async_trait]
pub trait Source: Send + Sync {
    type Payload: Send;

    fn name(&self) -> &str;

    async fn fetch(&self) -> SourceResult<Self::Payload>;

    fn format(&self, result: &SourceResult<Self::Payload>) -> String;
}

/// Object-safe view of a [`Source`] used by the aggregator.
#[async_trait]
pub trait DigestSource: Send + Sync {
    /// Fetch within `limit` and format the outcome into a digest fragment.
    async fn fragment(&self, limit: Duration) -> String;
}

#[async_trait]
impl<S: Source> DigestSource for S {
    async fn fragment(&self, limit: Duration) -> String {
        let result = fetch_with_timeout(self, limit).await;
        match &result {
            Ok(_) => debug!(source = self.name(), "source fetched"),
            Err(reason) => warn!(source = self.name(), %reason, "source unavailable"),
        }
        self.format(&result)
    }
}

/// Run `source.fetch()` with an upper bound; an elapsed timer becomes `Err`.
pub async fn fetch_with_timeout<S>(source: &S, limit: Duration) -> SourceResult<S::Payload>
where
    S: Source + ?Sized,
{
    match tokio::time::timeout(limit, source.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(format!("timed out after {}s", limit.as_secs_f64())),
    }
}
