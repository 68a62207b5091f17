pub mod news;
pub mod store;
pub mod synthetic;

pub use news::CuratedNewsFeed;
pub use store::{load_latest, SnapshotStore};

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use market_core::{
    CollectionMetadata, CollectionStatus, FetchError, Market, MarketProfile, MarketSnapshot, MissingQuote,
    NewsFeed, PipelineConfig, QuoteEntry, QuoteSource, SentimentSnapshot, SentimentSource, SourceUnavailable,
    StoreError, SubMarket, SymbolSpec,
};
use quote_client::{
    CnnFearGreedSource, ConnectFlowSource, EastMoneySource, FinnhubSource, QuoteClient, YahooChartSource,
    YahooIndicatorSource,
};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Collection cancelled")]
    Cancelled,

    #[error("Snapshot store error: {0}")]
    Store(#[from] StoreError),
}

/// One market's data acquisition. Per-symbol failures are absorbed; only
/// cancellation and store failures surface as errors.
#[async_trait]
pub trait SnapshotCollector: Send + Sync {
    fn market(&self) -> Market;

    async fn collect_all(&self, cancel: &CancellationToken) -> Result<MarketSnapshot, CollectorError>;

    /// Most recently persisted snapshot, `None` before the first run.
    async fn get_latest(&self) -> Result<Option<MarketSnapshot>, CollectorError>;
}

struct SymbolFetch {
    entry: QuoteEntry,
    live_source: Option<String>,
    failures: Vec<SourceUnavailable>,
}

pub struct MarketCollector {
    profile: MarketProfile,
    quote_sources: Vec<Arc<dyn QuoteSource>>,
    sentiment_sources: Vec<Arc<dyn SentimentSource>>,
    news_feed: Option<Arc<dyn NewsFeed>>,
    store: SnapshotStore,
    synthetic_fallback: bool,
    max_concurrent: usize,
}

impl MarketCollector {
    pub fn new(profile: MarketProfile, store: SnapshotStore) -> Self {
        Self {
            profile,
            quote_sources: Vec::new(),
            sentiment_sources: Vec::new(),
            news_feed: None,
            store,
            synthetic_fallback: true,
            max_concurrent: 3,
        }
    }

    /// Sources are tried in the order they are added.
    pub fn with_quote_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.quote_sources.push(source);
        self
    }

    pub fn with_sentiment_source(mut self, source: Arc<dyn SentimentSource>) -> Self {
        self.sentiment_sources.push(source);
        self
    }

    pub fn with_news_feed(mut self, feed: Arc<dyn NewsFeed>) -> Self {
        self.news_feed = Some(feed);
        self
    }

    pub fn with_synthetic_fallback(mut self, enabled: bool) -> Self {
        self.synthetic_fallback = enabled;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Collector wired to the live upstreams for `market`. Each collector gets its own
    /// HTTP client so pacing and connections are not shared across markets.
    pub fn from_config(config: &PipelineConfig, market: Market) -> Self {
        let profile = config
            .market(market)
            .cloned()
            .unwrap_or_else(|| MarketProfile::for_market(market));
        let client = QuoteClient::new(&config.http, config.retry);
        let yahoo = YahooChartSource::new(client.clone(), config.sources.yahoo_base_url.clone());

        let mut collector = Self::new(profile, SnapshotStore::new(&config.data_dir, market))
            .with_synthetic_fallback(config.synthetic_fallback)
            .with_max_concurrent(config.http.max_concurrent_fetches)
            .with_news_feed(Arc::new(CuratedNewsFeed));

        match market {
            Market::Commodity => {
                collector = collector
                    .with_quote_source(Arc::new(yahoo.clone()))
                    .with_sentiment_source(Arc::new(YahooIndicatorSource::dollar_index(yahoo)));
            }
            Market::ForeignEquity => {
                collector = collector.with_quote_source(Arc::new(yahoo.clone()));
                if let Some(key) = &config.sources.finnhub_api_key {
                    collector = collector.with_quote_source(Arc::new(FinnhubSource::new(
                        client.clone(),
                        config.sources.finnhub_base_url.clone(),
                        key.clone(),
                    )));
                }
                collector = collector
                    .with_sentiment_source(Arc::new(YahooIndicatorSource::vix(yahoo)))
                    .with_sentiment_source(Arc::new(CnnFearGreedSource::new(
                        client,
                        config.sources.fear_greed_url.clone(),
                    )));
            }
            Market::DomesticEquity => {
                collector = collector
                    .with_quote_source(Arc::new(EastMoneySource::new(
                        client.clone(),
                        config.sources.eastmoney_base_url.clone(),
                    )))
                    .with_quote_source(Arc::new(yahoo))
                    .with_sentiment_source(Arc::new(ConnectFlowSource::new(
                        client,
                        config.sources.eastmoney_base_url.clone(),
                    )));
            }
        }

        collector
    }

    pub fn profile(&self) -> &MarketProfile {
        &self.profile
    }

    async fn fetch_symbol(&self, spec: &SymbolSpec, cancel: &CancellationToken) -> Result<SymbolFetch, CollectorError> {
        let mut failures = Vec::new();

        for source in &self.quote_sources {
            match source.fetch_quote(spec, cancel).await {
                Ok(quote) => {
                    return Ok(SymbolFetch {
                        entry: QuoteEntry::Available(quote),
                        live_source: Some(source.name().to_string()),
                        failures,
                    })
                }
                Err(FetchError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(FetchError::Unavailable(e)) => failures.push(e),
            }
        }

        let entry = if self.synthetic_fallback {
            tracing::warn!("{}: all sources failed for {}, using synthetic data", self.profile.market, spec.symbol);
            QuoteEntry::Available(synthetic::synthesize(spec, Utc::now()))
        } else {
            tracing::warn!("{}: all sources failed for {}, recording as missing", self.profile.market, spec.symbol);
            let source = failures
                .iter()
                .map(|f| f.source_name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let error = failures
                .last()
                .map(|f| f.reason.clone())
                .unwrap_or_else(|| "no quote source configured".to_string());
            QuoteEntry::Missing(MissingQuote {
                symbol: spec.symbol.clone(),
                name: spec.name.clone(),
                source: if source.is_empty() { "none".to_string() } else { source },
                error,
                timestamp: Utc::now(),
            })
        };

        Ok(SymbolFetch {
            entry,
            live_source: None,
            failures,
        })
    }
}

#[async_trait]
impl SnapshotCollector for MarketCollector {
    fn market(&self) -> Market {
        self.profile.market
    }

    async fn collect_all(&self, cancel: &CancellationToken) -> Result<MarketSnapshot, CollectorError> {
        let market = self.profile.market;
        let collected_at = Utc::now();
        tracing::info!("Collecting {} ({} symbols)", market, self.profile.symbol_count());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut sources_ok = BTreeSet::new();
        let mut sources_failed = BTreeSet::new();
        let mut fallback_symbols = Vec::new();
        let mut degraded = false;
        let mut sub_markets = Vec::with_capacity(self.profile.sub_markets.len());

        for sub in &self.profile.sub_markets {
            let fetches = sub.symbols.iter().map(|spec| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    self.fetch_symbol(spec, cancel).await
                }
            });

            // join_all keeps the configured symbol order
            let mut quotes = Vec::with_capacity(sub.symbols.len());
            for fetched in join_all(fetches).await {
                let fetched = fetched?;
                for failure in &fetched.failures {
                    sources_failed.insert(failure.source_name.clone());
                }
                match fetched.live_source {
                    Some(source) => {
                        sources_ok.insert(source);
                    }
                    None => {
                        degraded = true;
                        fallback_symbols.push(fetched.entry.symbol().to_string());
                    }
                }
                quotes.push(fetched.entry);
            }
            sub_markets.push(SubMarket::new(sub.name.clone(), quotes));
        }

        let mut sentiment = SentimentSnapshot::default();
        for source in &self.sentiment_sources {
            match source.fetch_indicators(cancel).await {
                Ok(indicators) => {
                    sources_ok.insert(source.name().to_string());
                    for (name, indicator) in indicators {
                        sentiment.insert(name, indicator);
                    }
                }
                Err(FetchError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(FetchError::Unavailable(e)) => {
                    tracing::warn!("{}: sentiment source failed: {}", market, e);
                    sources_failed.insert(source.name().to_string());
                    degraded = true;
                }
            }
        }

        let mut news = Vec::new();
        if let Some(feed) = &self.news_feed {
            match feed.headlines(market, cancel).await {
                Ok(items) => {
                    sources_ok.insert(feed.name().to_string());
                    news = items;
                }
                Err(FetchError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(FetchError::Unavailable(e)) => {
                    tracing::warn!("{}: news feed failed: {}", market, e);
                    sources_failed.insert(feed.name().to_string());
                    degraded = true;
                }
            }
        }

        let note = if fallback_symbols.is_empty() {
            None
        } else if self.synthetic_fallback {
            Some(format!("{} symbol(s) use synthetic fallback data", fallback_symbols.len()))
        } else {
            Some(format!("{} symbol(s) unavailable", fallback_symbols.len()))
        };

        let snapshot = MarketSnapshot {
            market,
            collected_at,
            sub_markets,
            sentiment,
            news,
            metadata: CollectionMetadata {
                status: if degraded {
                    CollectionStatus::Partial
                } else {
                    CollectionStatus::Success
                },
                sources_ok: sources_ok.into_iter().collect(),
                sources_failed: sources_failed.into_iter().collect(),
                fallback_symbols,
                note,
            },
        };

        let path = self.store.save(&snapshot).await?;
        tracing::info!(
            "Collected {}: status={:?}, fallbacks={}, saved to {}",
            market,
            snapshot.metadata.status,
            snapshot.metadata.fallback_symbols.len(),
            path.display()
        );

        Ok(snapshot)
    }

    async fn get_latest(&self) -> Result<Option<MarketSnapshot>, CollectorError> {
        Ok(self.store.latest().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use market_core::{Provenance, Quote, SentimentIndicator, SubMarketProfile};

    struct StaticSource {
        name: &'static str,
        fail_for: Vec<&'static str>,
    }

    #[async_trait]
    impl QuoteSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_quote(&self, spec: &SymbolSpec, _cancel: &CancellationToken) -> Result<Quote, FetchError> {
            if self.fail_for.contains(&spec.symbol.as_str()) {
                return Err(FetchError::unavailable(self.name, &spec.symbol, 3, "HTTP 500"));
            }
            Ok(Quote {
                symbol: spec.symbol.clone(),
                name: spec.name.clone(),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                volume: Some(1000.0),
                currency: spec.currency.clone(),
                timestamp: Utc::now(),
                previous_close: Some(100.0),
                change: None,
                change_percent: None,
                sma_5: None,
                sma_10: None,
                provenance: Provenance::live(self.name),
            }
            .with_derived_change())
        }
    }

    struct CancelledSource;

    #[async_trait]
    impl QuoteSource for CancelledSource {
        fn name(&self) -> &str {
            "Cancelled"
        }

        async fn fetch_quote(&self, _spec: &SymbolSpec, _cancel: &CancellationToken) -> Result<Quote, FetchError> {
            Err(FetchError::Cancelled)
        }
    }

    struct FixedSentiment;

    #[async_trait]
    impl SentimentSource for FixedSentiment {
        fn name(&self) -> &str {
            "Fixed"
        }

        async fn fetch_indicators(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<(String, SentimentIndicator)>, FetchError> {
            Ok(vec![("vix_index".to_string(), SentimentIndicator::new(Some(14.25), "Calm"))])
        }
    }

    fn equity_profile() -> MarketProfile {
        MarketProfile {
            market: Market::ForeignEquity,
            currency: "USD".to_string(),
            sub_markets: vec![
                SubMarketProfile {
                    name: "indices".to_string(),
                    symbols: vec![
                        SymbolSpec::new("^DJI", "Dow Jones", "USD", Some(38_000.0)),
                        SymbolSpec::new("^GSPC", "S&P 500", "USD", None),
                    ],
                },
                SubMarketProfile {
                    name: "stocks".to_string(),
                    symbols: vec![
                        SymbolSpec::new("AAPL", "Apple", "USD", None),
                        SymbolSpec::new("MSFT", "Microsoft", "USD", None),
                    ],
                },
            ],
            benchmarks: vec!["^GSPC".to_string()],
        }
    }

    fn collector(dir: &std::path::Path, fail_for: Vec<&'static str>) -> MarketCollector {
        MarketCollector::new(equity_profile(), SnapshotStore::new(dir, Market::ForeignEquity))
            .with_quote_source(Arc::new(StaticSource {
                name: "Primary",
                fail_for,
            }))
            .with_sentiment_source(Arc::new(FixedSentiment))
            .with_news_feed(Arc::new(CuratedNewsFeed))
    }

    #[tokio::test]
    async fn test_all_live_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = collector(dir.path(), vec![])
            .collect_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot.metadata.status, CollectionStatus::Success);
        assert!(snapshot.metadata.fallback_symbols.is_empty());
        assert!(snapshot.entries().all(QuoteEntry::is_live));
        assert_eq!(snapshot.sentiment.value("vix_index"), Some(14.25));
        assert!(!snapshot.news.is_empty());
    }

    #[tokio::test]
    async fn test_failed_symbol_falls_back_and_marks_partial() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = collector(dir.path(), vec!["MSFT"])
            .collect_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot.metadata.status, CollectionStatus::Partial);
        assert_eq!(snapshot.metadata.fallback_symbols, vec!["MSFT".to_string()]);
        assert_eq!(snapshot.metadata.sources_failed, vec!["Primary".to_string()]);

        let msft = snapshot.quote("MSFT").and_then(QuoteEntry::quote).unwrap();
        assert!(matches!(msft.provenance, Provenance::Synthetic { .. }));

        // order within the sub-market is preserved
        let stocks: Vec<_> = snapshot.sub_market("stocks").unwrap().quotes.iter().map(|q| q.symbol()).collect();
        assert_eq!(stocks, vec!["AAPL", "MSFT"]);
        assert!(snapshot.quote("AAPL").unwrap().is_live());
    }

    #[tokio::test]
    async fn test_fallback_is_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(dir.path(), vec!["^GSPC"]);
        let cancel = CancellationToken::new();
        let first = collector.collect_all(&cancel).await.unwrap();
        let second = collector.collect_all(&cancel).await.unwrap();

        let a = first.quote("^GSPC").and_then(QuoteEntry::quote).unwrap();
        let b = second.quote("^GSPC").and_then(QuoteEntry::quote).unwrap();
        assert_relative_eq!(a.close, b.close);
        assert_eq!(a.change_percent, b.change_percent);
    }

    #[tokio::test]
    async fn test_secondary_source_keeps_run_live() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = collector(dir.path(), vec!["AAPL"])
            .with_quote_source(Arc::new(StaticSource {
                name: "Secondary",
                fail_for: vec![],
            }))
            .collect_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot.metadata.status, CollectionStatus::Success);
        let aapl = snapshot.quote("AAPL").and_then(QuoteEntry::quote).unwrap();
        assert_eq!(aapl.provenance, Provenance::live("Secondary"));
        assert!(snapshot.metadata.sources_failed.contains(&"Primary".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_synthesis_records_missing() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = collector(dir.path(), vec!["^DJI"])
            .with_synthetic_fallback(false)
            .collect_all(&CancellationToken::new())
            .await
            .unwrap();

        match snapshot.quote("^DJI").unwrap() {
            QuoteEntry::Missing(missing) => {
                assert_eq!(missing.source, "Primary");
                assert_eq!(missing.error, "HTTP 500");
            }
            other => panic!("expected missing entry, got {:?}", other),
        }
        assert_eq!(snapshot.metadata.status, CollectionStatus::Partial);
    }

    #[tokio::test]
    async fn test_collect_persists_latest() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(dir.path(), vec![]);
        assert!(collector.get_latest().await.unwrap().is_none());

        let snapshot = collector.collect_all(&CancellationToken::new()).await.unwrap();
        assert_eq!(collector.get_latest().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_cancellation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let collector = MarketCollector::new(equity_profile(), SnapshotStore::new(dir.path(), Market::ForeignEquity))
            .with_quote_source(Arc::new(CancelledSource));

        let result = collector.collect_all(&CancellationToken::new()).await;
        assert!(matches!(result, Err(CollectorError::Cancelled)));
        assert!(collector.get_latest().await.unwrap().is_none());
    }
}
