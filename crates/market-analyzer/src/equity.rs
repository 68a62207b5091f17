use std::cmp::Ordering;

use market_core::{Breadth, IndexRow, MarketOverview, MarketSnapshot, Mover, QuoteEntry, Trend};

const MOVERS: usize = 3;

pub fn index_table(snapshot: &MarketSnapshot) -> Vec<IndexRow> {
    let Some(indices) = snapshot.sub_market("indices") else {
        return Vec::new();
    };

    indices
        .quotes
        .iter()
        .map(|entry| {
            let quote = entry.quote();
            let change_percent = quote.and_then(|q| q.effective_change_percent());
            IndexRow {
                symbol: entry.symbol().to_string(),
                name: entry.name().to_string(),
                close: quote.map(|q| q.close),
                change_percent,
                trend: Trend::classify(change_percent),
                live: entry.is_live(),
            }
        })
        .collect()
}

/// Mean change across index rows that have one.
pub fn average_change(rows: &[IndexRow]) -> Option<f64> {
    let changes: Vec<f64> = rows.iter().filter_map(|r| r.change_percent).collect();
    if changes.is_empty() {
        None
    } else {
        Some(changes.iter().sum::<f64>() / changes.len() as f64)
    }
}

fn status_label(average: Option<f64>) -> &'static str {
    match average {
        None => "insufficient data",
        Some(a) if a > 0.5 => "strong advance",
        Some(a) if a > 0.1 => "mild advance",
        Some(a) if a < -0.5 => "weak decline",
        Some(a) if a < -0.1 => "mild pullback",
        Some(_) => "range-bound",
    }
}

fn movers(snapshot: &MarketSnapshot) -> Vec<Mover> {
    snapshot
        .sub_market("stocks")
        .map(|stocks| {
            stocks
                .quotes
                .iter()
                .filter_map(QuoteEntry::quote)
                .filter_map(|q| {
                    q.effective_change_percent().map(|change_percent| Mover {
                        symbol: q.symbol.clone(),
                        name: q.name.clone(),
                        change_percent,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn by_change_desc(a: &Mover, b: &Mover) -> Ordering {
    b.change_percent
        .partial_cmp(&a.change_percent)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

pub fn overview(snapshot: &MarketSnapshot, rows: &[IndexRow]) -> MarketOverview {
    let average = average_change(rows);
    let breadth = Breadth {
        advance: rows.iter().filter(|r| r.change_percent.is_some_and(|c| c > 0.0)).count(),
        decline: rows.iter().filter(|r| r.change_percent.is_some_and(|c| c < 0.0)).count(),
    };

    let mut ranked = movers(snapshot);
    ranked.sort_by(by_change_desc);
    let leaders: Vec<Mover> = ranked.iter().take(MOVERS).cloned().collect();
    let laggards: Vec<Mover> = ranked.iter().rev().take(MOVERS).cloned().collect();

    MarketOverview {
        status: status_label(average).to_string(),
        average_change_percent: average,
        breadth,
        leaders,
        laggards,
    }
}
