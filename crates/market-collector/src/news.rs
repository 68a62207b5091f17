use async_trait::async_trait;
use chrono::{Duration, Utc};
use market_core::{FetchError, Market, NewsFeed, NewsItem, NewsSentiment};
use tokio_util::sync::CancellationToken;

/// Editor-curated headlines per market. Stands in for a scraping backend.
#[derive(Debug, Clone, Default)]
pub struct CuratedNewsFeed;

fn item(title: &str, source: &str, url: &str, sentiment: NewsSentiment, summary: Option<&str>, age_days: i64) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        source: source.to_string(),
        url: url.to_string(),
        sentiment,
        timestamp: Utc::now() - Duration::days(age_days),
        summary: summary.map(str::to_string),
    }
}

#[async_trait]
impl NewsFeed for CuratedNewsFeed {
    fn name(&self) -> &str {
        "Curated news"
    }

    async fn headlines(&self, market: Market, cancel: &CancellationToken) -> Result<Vec<NewsItem>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let items = match market {
            Market::Commodity => vec![
                item(
                    "Fed rate decision steers gold",
                    "Reuters",
                    "https://www.reuters.com/markets/gold",
                    NewsSentiment::Neutral,
                    None,
                    0,
                ),
                item(
                    "Safe-haven demand supports gold prices",
                    "Bloomberg",
                    "https://www.bloomberg.com/news/gold",
                    NewsSentiment::Positive,
                    None,
                    0,
                ),
                item(
                    "Stronger dollar caps gold gains",
                    "CNBC",
                    "https://www.cnbc.com/gold",
                    NewsSentiment::Negative,
                    None,
                    0,
                ),
            ],
            Market::ForeignEquity => vec![
                item(
                    "FOMC rate decision",
                    "Federal Reserve",
                    "https://www.federalreserve.gov/monetarypolicy.htm",
                    NewsSentiment::Neutral,
                    Some("Rates expected to stay on hold"),
                    0,
                ),
                item(
                    "Nonfarm payrolls report",
                    "Bureau of Labor Statistics",
                    "https://www.bls.gov/ces/",
                    NewsSentiment::Neutral,
                    Some("Consensus expects about 185k new jobs"),
                    0,
                ),
                item(
                    "CPI release",
                    "Bureau of Labor Statistics",
                    "https://www.bls.gov/cpi/",
                    NewsSentiment::Neutral,
                    Some("Headline inflation forecast at 3.2% year over year"),
                    0,
                ),
            ],
            Market::DomesticEquity => vec![
                item(
                    "PBOC reverse repo operations",
                    "People's Bank of China",
                    "http://www.pbc.gov.cn",
                    NewsSentiment::Neutral,
                    Some("7-day reverse repos keep market liquidity steady"),
                    0,
                ),
                item(
                    "Manufacturing PMI released",
                    "National Bureau of Statistics",
                    "http://www.stats.gov.cn",
                    NewsSentiment::Positive,
                    Some("PMI slightly above expectations, pointing to stabilization"),
                    1,
                ),
            ],
        };

        Ok(items)
    }
}
