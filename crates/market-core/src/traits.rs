use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{FetchError, Market, NewsItem, Quote, SentimentIndicator, SymbolSpec};

/// Upstream that can price a single symbol
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_quote(
        &self,
        spec: &SymbolSpec,
        cancel: &CancellationToken,
    ) -> Result<Quote, FetchError>;
}

/// Upstream for one or more named sentiment indicators
#[async_trait]
pub trait SentimentSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_indicators(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, SentimentIndicator)>, FetchError>;
}

/// Headline feed producing sentiment-tagged items
#[async_trait]
pub trait NewsFeed: Send + Sync {
    fn name(&self) -> &str;

    async fn headlines(
        &self,
        market: Market,
        cancel: &CancellationToken,
    ) -> Result<Vec<NewsItem>, FetchError>;
}
