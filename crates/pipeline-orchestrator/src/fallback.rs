//! Static snapshots used when a whole collector run fails.

use chrono::{DateTime, Utc};
use market_core::{
    CollectionMetadata, CollectionStatus, Market, MarketSnapshot, Provenance, Quote, QuoteEntry, SentimentSnapshot,
    SubMarket,
};

struct StaticRow {
    sub_market: &'static str,
    symbol: &'static str,
    name: &'static str,
    close: f64,
    change_percent: f64,
}

const fn row(sub_market: &'static str, symbol: &'static str, name: &'static str, close: f64, change_percent: f64) -> StaticRow {
    StaticRow {
        sub_market,
        symbol,
        name,
        close,
        change_percent,
    }
}

fn rows(market: Market) -> &'static [StaticRow] {
    const GOLD: &[StaticRow] = &[row("futures", "GC=F", "Gold Futures", 2050.00, 0.30)];
    const US: &[StaticRow] = &[
        row("indices", "^DJI", "Dow Jones Industrial Average", 38_000.00, 0.20),
        row("indices", "^IXIC", "NASDAQ Composite", 15_000.00, 0.40),
    ];
    const CN: &[StaticRow] = &[row("indices", "000001.SS", "Shanghai Composite", 2877.00, 0.15)];

    match market {
        Market::Commodity => GOLD,
        Market::ForeignEquity => US,
        Market::DomesticEquity => CN,
    }
}

fn currency(market: Market) -> &'static str {
    match market {
        Market::DomesticEquity => "CNY",
        Market::Commodity | Market::ForeignEquity => "USD",
    }
}

fn quote(market: Market, row: &StaticRow, at: DateTime<Utc>) -> Quote {
    let previous_close = row.close / (1.0 + row.change_percent / 100.0);
    Quote {
        symbol: row.symbol.to_string(),
        name: row.name.to_string(),
        open: previous_close,
        high: row.close.max(previous_close),
        low: row.close.min(previous_close),
        close: row.close,
        volume: None,
        currency: currency(market).to_string(),
        timestamp: at,
        previous_close: Some(previous_close),
        change: Some(row.close - previous_close),
        change_percent: Some(row.change_percent),
        sma_5: None,
        sma_10: None,
        provenance: Provenance::StaticFallback,
    }
}

/// Snapshot built from the fixed table for `market`, marked partial with `reason` in the note.
pub fn static_snapshot(market: Market, at: DateTime<Utc>, reason: &str) -> MarketSnapshot {
    let mut sub_markets: Vec<SubMarket> = Vec::new();
    for row in rows(market) {
        let entry = QuoteEntry::Available(quote(market, row, at));
        match sub_markets.iter_mut().find(|s| s.name == row.sub_market) {
            Some(sub) => sub.quotes.push(entry),
            None => sub_markets.push(SubMarket::new(row.sub_market, vec![entry])),
        }
    }

    MarketSnapshot {
        market,
        collected_at: at,
        sub_markets,
        sentiment: SentimentSnapshot::default(),
        news: Vec::new(),
        metadata: CollectionMetadata {
            status: CollectionStatus::Partial,
            sources_ok: Vec::new(),
            sources_failed: vec!["collector".to_string()],
            fallback_symbols: rows(market).iter().map(|r| r.symbol.to_string()).collect(),
            note: Some(format!("Collector failed ({}); static fallback values", reason)),
        },
    }
}
