use async_trait::async_trait;
use chrono::Utc;
use market_core::{FetchError, Provenance, Quote, QuoteSource, SentimentIndicator, SentimentSource, SymbolSpec};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::QuoteClient;

pub const SOURCE_NAME: &str = "East Money";

/// Fields requested from `qt/stock/get`: price, high, low, open, volume, previous close, change-percent.
const QUOTE_FIELDS: &str = "f43,f44,f45,f46,f47,f60,f170";

/// Maps `600519.SS` to `1.600519` and `300750.SZ` to `0.300750`.
pub fn secid(symbol: &str) -> Option<String> {
    if let Some(code) = symbol.strip_suffix(".SS") {
        Some(format!("1.{}", code))
    } else {
        symbol.strip_suffix(".SZ").map(|code| format!("0.{}", code))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EastMoneyResponse {
    #[serde(default)]
    data: Option<Value>,
}

/// Numeric field; suspended instruments report "-" instead of a number.
fn field(data: &Value, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Real-time A-share and index quotes. `fltt=2` makes every price a plain decimal.
#[derive(Clone)]
pub struct EastMoneySource {
    client: QuoteClient,
    base_url: String,
}

impl EastMoneySource {
    pub fn new(client: QuoteClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for EastMoneySource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_quote(&self, spec: &SymbolSpec, cancel: &CancellationToken) -> Result<Quote, FetchError> {
        let secid = secid(&spec.symbol).ok_or_else(|| {
            FetchError::unavailable(SOURCE_NAME, &spec.symbol, 0, "unsupported exchange suffix")
        })?;

        let url = format!("{}/qt/stock/get", self.base_url.trim_end_matches('/'));
        let query = [
            ("secid", secid),
            ("fields", QUOTE_FIELDS.to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
        ];

        let response: EastMoneyResponse = self
            .client
            .get_json(SOURCE_NAME, &spec.symbol, &url, &query, cancel)
            .await?;

        quote_from_response(spec, response)
            .map_err(|reason| FetchError::unavailable(SOURCE_NAME, &spec.symbol, 1, reason))
    }
}

pub(crate) fn quote_from_response(spec: &SymbolSpec, response: EastMoneyResponse) -> Result<Quote, String> {
    let data = response
        .data
        .filter(|d| !d.is_null())
        .ok_or_else(|| "no data for symbol".to_string())?;

    let close = field(&data, "f43").ok_or_else(|| "no last price".to_string())?;
    let quote = Quote {
        symbol: spec.symbol.clone(),
        name: spec.name.clone(),
        open: field(&data, "f46").unwrap_or(close),
        high: field(&data, "f44").unwrap_or(close),
        low: field(&data, "f45").unwrap_or(close),
        close,
        volume: field(&data, "f47"),
        currency: spec.currency.clone(),
        timestamp: Utc::now(),
        previous_close: field(&data, "f60"),
        change: None,
        change_percent: field(&data, "f170"),
        sma_5: None,
        sma_10: None,
        provenance: Provenance::live(SOURCE_NAME),
    };
    Ok(quote.with_derived_change())
}

/// Stock Connect net flows. Northbound is hk2sh + hk2sz, southbound is sh2hk + sz2hk.
#[derive(Clone)]
pub struct ConnectFlowSource {
    client: QuoteClient,
    base_url: String,
}

impl ConnectFlowSource {
    pub fn new(client: QuoteClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlowResponse {
    #[serde(default)]
    data: Option<FlowData>,
}

#[derive(Debug, Default, Deserialize)]
struct FlowData {
    hk2sh: Option<FlowLeg>,
    hk2sz: Option<FlowLeg>,
    sh2hk: Option<FlowLeg>,
    sz2hk: Option<FlowLeg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowLeg {
    /// Units of 10k CNY
    day_net_amt_in: Option<f64>,
}

fn net(legs: [&Option<FlowLeg>; 2]) -> Option<f64> {
    let values: Vec<f64> = legs
        .iter()
        .filter_map(|leg| leg.as_ref().and_then(|l| l.day_net_amt_in))
        .collect();
    if values.is_empty() {
        None
    } else {
        // 10k CNY -> 100M CNY
        Some(values.iter().sum::<f64>() / 10_000.0)
    }
}

fn flow_indicator(value: f64, label: &str) -> SentimentIndicator {
    let interpretation = if value > 0.0 {
        format!("{} net inflow", label)
    } else if value < 0.0 {
        format!("{} net outflow", label)
    } else {
        format!("{} flat", label)
    };
    let mut indicator = SentimentIndicator::new(Some(value), interpretation);
    indicator.unit = Some("CNY 100M".to_string());
    indicator
}

pub(crate) fn indicators_from_flow(response: FlowResponse) -> Result<Vec<(String, SentimentIndicator)>, String> {
    let data = response.data.ok_or_else(|| "no flow data".to_string())?;
    let mut indicators = Vec::new();
    if let Some(north) = net([&data.hk2sh, &data.hk2sz]) {
        indicators.push(("north_money".to_string(), flow_indicator(north, "Northbound")));
    }
    if let Some(south) = net([&data.sh2hk, &data.sz2hk]) {
        indicators.push(("south_money".to_string(), flow_indicator(south, "Southbound")));
    }
    if indicators.is_empty() {
        return Err("flow legs carried no amounts".to_string());
    }
    Ok(indicators)
}

#[async_trait]
impl SentimentSource for ConnectFlowSource {
    fn name(&self) -> &str {
        "East Money Stock Connect"
    }

    async fn fetch_indicators(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, SentimentIndicator)>, FetchError> {
        let url = format!("{}/qt/kamt/get", self.base_url.trim_end_matches('/'));
        let query = [
            ("fields1", "f1,f2,f3,f4".to_string()),
            ("fields2", "f51,f52,f53,f54,f56".to_string()),
        ];

        let response: FlowResponse = self
            .client
            .get_json(self.name(), "north_money", &url, &query, cancel)
            .await?;

        indicators_from_flow(response).map_err(|reason| FetchError::unavailable(self.name(), "north_money", 1, reason))
    }
}
