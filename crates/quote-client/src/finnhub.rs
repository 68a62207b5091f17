use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{FetchError, Provenance, Quote, QuoteSource, SymbolSpec};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::QuoteClient;

pub const SOURCE_NAME: &str = "Finnhub";

/// Secondary US quote source, only wired up when an API key is configured.
#[derive(Clone)]
pub struct FinnhubSource {
    client: QuoteClient,
    base_url: String,
    api_key: String,
}

impl FinnhubSource {
    pub fn new(client: QuoteClient, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FinnhubQuote {
    c: Option<f64>,
    d: Option<f64>,
    dp: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    o: Option<f64>,
    pc: Option<f64>,
    t: Option<i64>,
}

pub(crate) fn quote_from_finnhub(spec: &SymbolSpec, raw: FinnhubQuote) -> Result<Quote, String> {
    // Unknown symbols come back as all zeros
    let close = raw
        .c
        .filter(|c| c.is_finite() && *c > 0.0)
        .ok_or_else(|| "no current price".to_string())?;

    let quote = Quote {
        symbol: spec.symbol.clone(),
        name: spec.name.clone(),
        open: raw.o.filter(|v| *v > 0.0).unwrap_or(close),
        high: raw.h.filter(|v| *v > 0.0).unwrap_or(close),
        low: raw.l.filter(|v| *v > 0.0).unwrap_or(close),
        close,
        volume: None,
        currency: spec.currency.clone(),
        timestamp: raw
            .t
            .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
            .unwrap_or_else(Utc::now),
        previous_close: raw.pc.filter(|v| *v > 0.0),
        change: raw.d,
        change_percent: raw.dp,
        sma_5: None,
        sma_10: None,
        provenance: Provenance::live(SOURCE_NAME),
    };
    Ok(quote.with_derived_change())
}

#[async_trait]
impl QuoteSource for FinnhubSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_quote(&self, spec: &SymbolSpec, cancel: &CancellationToken) -> Result<Quote, FetchError> {
        let url = format!("{}/quote", self.base_url.trim_end_matches('/'));
        let query = [("symbol", spec.symbol.clone()), ("token", self.api_key.clone())];

        let raw: FinnhubQuote = self
            .client
            .get_json(SOURCE_NAME, &spec.symbol, &url, &query, cancel)
            .await?;

        quote_from_finnhub(spec, raw).map_err(|reason| FetchError::unavailable(SOURCE_NAME, &spec.symbol, 1, reason))
    }
}
