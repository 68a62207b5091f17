use async_trait::async_trait;
use market_core::{FetchError, QuoteSource, SentimentIndicator, SentimentSource, SymbolSpec};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{QuoteClient, YahooChartSource};

type Interpret = fn(f64, Option<f64>) -> String;

/// A sentiment reading taken from a Yahoo-quoted instrument (volatility index, dollar index).
#[derive(Clone)]
pub struct YahooIndicatorSource {
    chart: YahooChartSource,
    spec: SymbolSpec,
    key: String,
    interpret: Interpret,
}

impl YahooIndicatorSource {
    pub fn new(chart: YahooChartSource, symbol: &str, key: &str, interpret: Interpret) -> Self {
        Self {
            chart,
            spec: SymbolSpec::new(symbol, key, "USD", None),
            key: key.to_string(),
            interpret,
        }
    }

    /// US Dollar Index, read against gold.
    pub fn dollar_index(chart: YahooChartSource) -> Self {
        Self::new(chart, "DX-Y.NYB", "dollar_index", interpret_dollar)
    }

    /// CBOE volatility index.
    pub fn vix(chart: YahooChartSource) -> Self {
        Self::new(chart, "^VIX", "vix_index", interpret_vix)
    }
}

fn interpret_dollar(_value: f64, change_percent: Option<f64>) -> String {
    match change_percent {
        Some(c) if c > 0.0 => "Dollar strengthening, a headwind for gold".to_string(),
        Some(c) if c < 0.0 => "Dollar weakening, supportive for gold".to_string(),
        Some(_) => "Dollar flat".to_string(),
        None => "Dollar direction unavailable".to_string(),
    }
}

fn interpret_vix(value: f64, _change_percent: Option<f64>) -> String {
    if value > 30.0 {
        "High fear, elevated volatility".to_string()
    } else if value > 20.0 {
        "Above-average volatility".to_string()
    } else {
        "Calm market, low volatility".to_string()
    }
}

#[async_trait]
impl SentimentSource for YahooIndicatorSource {
    fn name(&self) -> &str {
        crate::yahoo::SOURCE_NAME
    }

    async fn fetch_indicators(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, SentimentIndicator)>, FetchError> {
        let quote = self.chart.fetch_quote(&self.spec, cancel).await?;
        let change_percent = quote.effective_change_percent();

        let mut indicator = SentimentIndicator::new(Some(quote.close), (self.interpret)(quote.close, change_percent));
        indicator.change = change_percent;
        indicator.unit = Some("points".to_string());
        Ok(vec![(self.key.clone(), indicator)])
    }
}

/// CNN Fear & Greed index, 0 (extreme fear) to 100 (extreme greed).
#[derive(Clone)]
pub struct CnnFearGreedSource {
    client: QuoteClient,
    url: String,
}

impl CnnFearGreedSource {
    pub fn new(client: QuoteClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FearGreedResponse {
    fear_and_greed: FearGreedData,
}

#[derive(Debug, Deserialize)]
struct FearGreedData {
    score: f64,
    rating: Option<String>,
    previous_close: Option<f64>,
}

pub(crate) fn indicator_from_fear_greed(response: FearGreedResponse) -> SentimentIndicator {
    let data = response.fear_and_greed;
    let interpretation = match data.score {
        s if s >= 75.0 => "Extreme greed",
        s if s >= 55.0 => "Greed",
        s if s > 45.0 => "Neutral",
        s if s > 25.0 => "Fear",
        _ => "Extreme fear",
    };

    let mut indicator = SentimentIndicator::new(Some(data.score), interpretation);
    indicator.change = data.previous_close.map(|prev| data.score - prev);
    indicator.level = data.rating;
    indicator
}

#[async_trait]
impl SentimentSource for CnnFearGreedSource {
    fn name(&self) -> &str {
        "CNN Fear & Greed"
    }

    async fn fetch_indicators(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, SentimentIndicator)>, FetchError> {
        let response: FearGreedResponse = self
            .client
            .get_json(self.name(), "fear_greed_index", &self.url, &[], cancel)
            .await?;
        Ok(vec![("fear_greed_index".to_string(), indicator_from_fear_greed(response))])
    }
}
