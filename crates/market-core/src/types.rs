use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three disjoint markets a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    /// Gold (futures + spot)
    #[serde(rename = "gold")]
    Commodity,
    /// US index set and large caps
    #[serde(rename = "stocks_usa")]
    ForeignEquity,
    /// China A-share index set and blue chips
    #[serde(rename = "stocks_cn")]
    DomesticEquity,
}

impl Market {
    /// Fixed processing and rendering order.
    pub const ALL: [Market; 3] = [Market::Commodity, Market::ForeignEquity, Market::DomesticEquity];

    /// Storage namespace, also used as the serialized name.
    pub fn key(&self) -> &'static str {
        match self {
            Market::Commodity => "gold",
            Market::ForeignEquity => "stocks_usa",
            Market::DomesticEquity => "stocks_cn",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Market::Commodity => "Gold",
            Market::ForeignEquity => "US Stocks",
            Market::DomesticEquity => "China A-Shares",
        }
    }

    pub fn is_equity(&self) -> bool {
        !matches!(self, Market::Commodity)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a quote's numbers came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Returned by an upstream source
    Live { source: String },
    /// Deterministic substitute derived from the symbol hash
    Synthetic { seed: String },
    /// Static table used when a whole collector run failed
    StaticFallback,
}

impl Provenance {
    pub fn live(source: impl Into<String>) -> Self {
        Provenance::Live { source: source.into() }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Provenance::Live { .. })
    }

    /// Short label for reports and logs.
    pub fn label(&self) -> String {
        match self {
            Provenance::Live { source } => source.clone(),
            Provenance::Synthetic { .. } => "Synthetic".to_string(),
            Provenance::StaticFallback => "Static fallback".to_string(),
        }
    }
}

/// Percentage change of `current` against `previous`, if `previous` is usable.
pub fn percent_change(current: f64, previous: Option<f64>) -> Option<f64> {
    match previous {
        Some(prev) if prev != 0.0 && prev.is_finite() && current.is_finite() => {
            Some((current - prev) / prev * 100.0)
        }
        _ => None,
    }
}

/// A single priced instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub previous_close: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    /// 5-period simple moving average of closes, when enough history was returned
    #[serde(default)]
    pub sma_5: Option<f64>,
    #[serde(default)]
    pub sma_10: Option<f64>,
    pub provenance: Provenance,
}

impl Quote {
    /// Recompute `change` and `change_percent` from `previous_close` when it is usable.
    /// Leaves upstream-reported values untouched otherwise.
    pub fn with_derived_change(mut self) -> Self {
        if let (Some(prev), Some(pct)) = (self.previous_close, percent_change(self.close, self.previous_close)) {
            self.change = Some(self.close - prev);
            self.change_percent = Some(pct);
        }
        self
    }

    /// Change-percent, preferring the value derived from `previous_close`.
    pub fn effective_change_percent(&self) -> Option<f64> {
        percent_change(self.close, self.previous_close).or(self.change_percent)
    }

    pub fn is_live(&self) -> bool {
        self.provenance.is_live()
    }
}

/// Placeholder for a symbol that produced no usable data. Carries no numbers on purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingQuote {
    pub symbol: String,
    pub name: String,
    pub source: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Either a usable quote or an error marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuoteEntry {
    Available(Quote),
    Missing(MissingQuote),
}

impl QuoteEntry {
    pub fn symbol(&self) -> &str {
        match self {
            QuoteEntry::Available(q) => &q.symbol,
            QuoteEntry::Missing(m) => &m.symbol,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            QuoteEntry::Available(q) => &q.name,
            QuoteEntry::Missing(m) => &m.name,
        }
    }

    pub fn quote(&self) -> Option<&Quote> {
        match self {
            QuoteEntry::Available(q) => Some(q),
            QuoteEntry::Missing(_) => None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.quote().is_some_and(Quote::is_live)
    }
}

/// A named group of quotes ("futures", "spot", "indices", "stocks").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubMarket {
    pub name: String,
    pub quotes: Vec<QuoteEntry>,
}

impl SubMarket {
    pub fn new(name: impl Into<String>, quotes: Vec<QuoteEntry>) -> Self {
        Self {
            name: name.into(),
            quotes,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&QuoteEntry> {
        self.quotes.iter().find(|q| q.symbol() == symbol)
    }

    pub fn available(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.iter().filter_map(QuoteEntry::quote)
    }
}

/// One named sentiment reading (volatility index, capital flow, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentIndicator {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Upstream rating such as "Greed"
    #[serde(default)]
    pub level: Option<String>,
    pub interpretation: String,
}

impl SentimentIndicator {
    pub fn new(value: Option<f64>, interpretation: impl Into<String>) -> Self {
        Self {
            value,
            change: None,
            unit: None,
            level: None,
            interpretation: interpretation.into(),
        }
    }
}

/// Free-form, market-specific indicator map. Any key may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentimentSnapshot {
    pub indicators: BTreeMap<String, SentimentIndicator>,
}

impl SentimentSnapshot {
    pub fn get(&self, name: &str) -> Option<&SentimentIndicator> {
        self.indicators.get(name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|i| i.value)
    }

    pub fn insert(&mut self, name: impl Into<String>, indicator: SentimentIndicator) {
        self.indicators.insert(name.into(), indicator);
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsSentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub url: String,
    pub sentiment: NewsSentiment,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// Every source returned live data
    Success,
    /// At least one fetch fell back or failed
    Partial,
}

impl CollectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CollectionStatus::Success => "success",
            CollectionStatus::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub status: CollectionStatus,
    #[serde(default)]
    pub sources_ok: Vec<String>,
    #[serde(default)]
    pub sources_failed: Vec<String>,
    #[serde(default)]
    pub fallback_symbols: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Everything one collector run produced for its market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market: Market,
    pub collected_at: DateTime<Utc>,
    pub sub_markets: Vec<SubMarket>,
    #[serde(default)]
    pub sentiment: SentimentSnapshot,
    #[serde(default)]
    pub news: Vec<NewsItem>,
    pub metadata: CollectionMetadata,
}

impl MarketSnapshot {
    pub fn sub_market(&self, name: &str) -> Option<&SubMarket> {
        self.sub_markets.iter().find(|s| s.name == name)
    }

    /// Looks a symbol up across every sub-market.
    pub fn quote(&self, symbol: &str) -> Option<&QuoteEntry> {
        self.sub_markets.iter().find_map(|s| s.get(symbol))
    }

    pub fn entries(&self) -> impl Iterator<Item = &QuoteEntry> {
        self.sub_markets.iter().flat_map(|s| s.quotes.iter())
    }
}

/// Raw snapshots handed to the renderer. Any market may be absent (report mode with an empty store).
#[derive(Debug, Clone, Default)]
pub struct SnapshotSet {
    pub commodity: Option<MarketSnapshot>,
    pub foreign_equity: Option<MarketSnapshot>,
    pub domestic_equity: Option<MarketSnapshot>,
}

impl SnapshotSet {
    pub fn get(&self, market: Market) -> Option<&MarketSnapshot> {
        match market {
            Market::Commodity => self.commodity.as_ref(),
            Market::ForeignEquity => self.foreign_equity.as_ref(),
            Market::DomesticEquity => self.domestic_equity.as_ref(),
        }
    }

    pub fn insert(&mut self, snapshot: MarketSnapshot) {
        match snapshot.market {
            Market::Commodity => self.commodity = Some(snapshot),
            Market::ForeignEquity => self.foreign_equity = Some(snapshot),
            Market::DomesticEquity => self.domestic_equity = Some(snapshot),
        }
    }
}
