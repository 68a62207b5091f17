use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{FetchError, Provenance, Quote, QuoteSource, SymbolSpec};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::QuoteClient;

pub const SOURCE_NAME: &str = "Yahoo Finance";

/// Daily bars from the v8 chart endpoint. Enough history is requested to
/// derive the previous close and the 5/10-day averages.
#[derive(Clone)]
pub struct YahooChartSource {
    client: QuoteClient,
    base_url: String,
}

impl YahooChartSource {
    pub fn new(client: QuoteClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for YahooChartSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_quote(&self, spec: &SymbolSpec, cancel: &CancellationToken) -> Result<Quote, FetchError> {
        let url = format!("{}/chart/{}", self.base_url.trim_end_matches('/'), spec.symbol);
        let query = [("interval", "1d".to_string()), ("range", "1mo".to_string())];

        let response: ChartResponse = self
            .client
            .get_json(SOURCE_NAME, &spec.symbol, &url, &query, cancel)
            .await?;

        quote_from_chart(spec, response)
            .map_err(|reason| FetchError::unavailable(SOURCE_NAME, &spec.symbol, 1, reason))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<BarSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct BarSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

struct Bar {
    timestamp: Option<i64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
    volume: Option<f64>,
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}

fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

pub(crate) fn quote_from_chart(spec: &SymbolSpec, response: ChartResponse) -> Result<Quote, String> {
    if let Some(error) = response.chart.error {
        return Err(format!("{}: {}", error.code, error.description));
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| "empty chart result".to_string())?;
    let series = data.indicators.quote.into_iter().next().unwrap_or_default();

    // Bars without a close (holidays, partial sessions) are skipped
    let bars: Vec<Bar> = (0..series.close.len())
        .filter_map(|i| {
            at(&series.close, i).map(|close| Bar {
                timestamp: data.timestamp.get(i).copied(),
                open: at(&series.open, i),
                high: at(&series.high, i),
                low: at(&series.low, i),
                close,
                volume: at(&series.volume, i),
            })
        })
        .collect();

    let currency = data.meta.currency.clone().unwrap_or_else(|| spec.currency.clone());

    let Some(last) = bars.last() else {
        let price = data
            .meta
            .regular_market_price
            .ok_or_else(|| "no price data".to_string())?;
        return Ok(Quote {
            symbol: spec.symbol.clone(),
            name: spec.name.clone(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: None,
            currency,
            timestamp: Utc::now(),
            previous_close: data.meta.previous_close.or(data.meta.chart_previous_close),
            change: None,
            change_percent: None,
            sma_5: None,
            sma_10: None,
            provenance: Provenance::live(SOURCE_NAME),
        }
        .with_derived_change());
    };

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let previous_close = if bars.len() > 1 {
        Some(bars[bars.len() - 2].close)
    } else {
        data.meta.chart_previous_close.or(data.meta.previous_close)
    };

    let timestamp = last
        .timestamp
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .unwrap_or_else(Utc::now);

    Ok(Quote {
        symbol: spec.symbol.clone(),
        name: spec.name.clone(),
        open: last.open.unwrap_or(last.close),
        high: last.high.unwrap_or(last.close),
        low: last.low.unwrap_or(last.close),
        close: last.close,
        volume: last.volume,
        currency,
        timestamp,
        previous_close,
        change: None,
        change_percent: None,
        sma_5: sma(&closes, 5),
        sma_10: sma(&closes, 10),
        provenance: Provenance::live(SOURCE_NAME),
    }
    .with_derived_change())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spec() -> SymbolSpec {
        SymbolSpec::new("GC=F", "Gold Futures", "USD", Some(2050.0))
    }

    fn parse(json: &str) -> Result<Quote, String> {
        let response: ChartResponse = serde_json::from_str(json).unwrap();
        quote_from_chart(&spec(), response)
    }

    #[test]
    fn test_parse_chart_uses_prior_bar_as_previous_close() {
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": {"currency": "USD", "regularMarketPrice": 2050.3, "chartPreviousClose": 2030.0},
                    "timestamp": [1704067200, 1704153600, 1704240000],
                    "indicators": {"quote": [{
                        "open":   [2030.0, 2040.0, 2042.0],
                        "high":   [2045.0, 2044.0, 2055.0],
                        "low":    [2025.0, 2035.0, 2040.0],
                        "close":  [2038.0, 2041.2, 2050.3],
                        "volume": [1000, 1200, null]
                    }]}
                }],
                "error": null
            }
        }"#;

        let quote = parse(json).unwrap();
        assert_relative_eq!(quote.close, 2050.3);
        assert_eq!(quote.previous_close, Some(2041.2));
        assert_relative_eq!(quote.change_percent.unwrap(), (2050.3 - 2041.2) / 2041.2 * 100.0, epsilon = 1e-9);
        assert_eq!(quote.volume, None);
        assert_eq!(quote.sma_5, None);
        assert_eq!(quote.timestamp.timestamp(), 1704240000);
        assert!(quote.is_live());
    }

    #[test]
    fn test_parse_chart_skips_null_closes_and_computes_sma() {
        let closes: Vec<String> = (1..=10).map(|i| format!("{}.0", i)).chain(["null".to_string()]).collect();
        let json = format!(
            r#"{{"chart": {{"result": [{{"meta": {{}}, "timestamp": [], "indicators": {{"quote": [{{"close": [{}]}}]}}}}]}}}}"#,
            closes.join(",")
        );

        let quote = parse(&json).unwrap();
        assert_relative_eq!(quote.close, 10.0);
        assert_relative_eq!(quote.sma_5.unwrap(), 8.0);
        assert_relative_eq!(quote.sma_10.unwrap(), 5.5);
        assert_eq!(quote.previous_close, Some(9.0));
        assert_eq!(quote.currency, "USD");
    }

    #[test]
    fn test_parse_chart_error_payload() {
        let json = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}}"#;
        let err = parse(json).unwrap_err();
        assert!(err.contains("Not Found"));
    }

    #[test]
    fn test_parse_chart_falls_back_to_meta_price() {
        let json = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 104.5, "previousClose": 100.0}, "indicators": {"quote": []}}]}}"#;
        let quote = parse(json).unwrap();
        assert_relative_eq!(quote.close, 104.5);
        assert_relative_eq!(quote.change_percent.unwrap(), 4.5, epsilon = 1e-9);
    }
}
