//! Deterministic stand-in quotes for symbols whose every source failed.
//!
//! Values are derived from SHA-256 of the symbol only, so they are identical
//! within a run and across process restarts.

use chrono::{DateTime, Utc};
use market_core::{Provenance, Quote, SymbolSpec};
use sha2::{Digest, Sha256};

fn digest_prefix(symbol: &str) -> [u8; 8] {
    let digest = Sha256::digest(symbol.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    prefix
}

/// First eight bytes of SHA-256(symbol), big-endian.
pub fn seed(symbol: &str) -> u64 {
    u64::from_be_bytes(digest_prefix(symbol))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price anchored within ±2% of the reference when one is known, else `10..5010`.
pub fn synthetic_price(seed: u64, reference: Option<f64>) -> f64 {
    match reference {
        Some(reference) if reference > 0.0 && reference.is_finite() => {
            let offset = ((seed % 400) as f64 - 200.0) / 10_000.0;
            round2(reference * (1.0 + offset))
        }
        _ => (seed % 5000) as f64 + 10.0,
    }
}

/// Change-percent in `[-1.00, 0.99]`.
pub fn synthetic_change_percent(seed: u64) -> f64 {
    (((seed >> 16) % 200) as f64 - 100.0) / 100.0
}

pub fn synthesize(spec: &SymbolSpec, at: DateTime<Utc>) -> Quote {
    let prefix = digest_prefix(&spec.symbol);
    let seed = u64::from_be_bytes(prefix);

    let close = synthetic_price(seed, spec.reference_price);
    let change_percent = synthetic_change_percent(seed);
    let previous_close = close / (1.0 + change_percent / 100.0);
    let open = previous_close;
    let swing = change_percent.abs() / 100.0;

    Quote {
        symbol: spec.symbol.clone(),
        name: spec.name.clone(),
        open,
        high: open.max(close) * (1.0 + swing * 0.2),
        low: open.min(close) * (1.0 - swing * 0.15),
        close,
        volume: Some(((seed >> 32) % 50_000_000 + 1_000_000) as f64),
        currency: spec.currency.clone(),
        timestamp: at,
        previous_close: Some(previous_close),
        change: Some(close - previous_close),
        change_percent: Some(change_percent),
        sma_5: None,
        sma_10: None,
        provenance: Provenance::Synthetic {
            seed: hex::encode(prefix),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_seed_is_sha256_prefix() {
        assert_eq!(seed("AAPL"), 0x1eb4_4d62_5271_a4eb);
        assert_eq!(seed("GC=F"), 0x652c_c40d_03a6_4e41);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let at = Utc::now();
        let spec = SymbolSpec::new("AAPL", "Apple", "USD", None);
        let first = synthesize(&spec, at);
        let second = synthesize(&spec, at);
        assert_eq!(first, second);

        assert_relative_eq!(first.close, 4429.0);
        assert_relative_eq!(first.change_percent.unwrap(), -0.75);
        assert_eq!(
            first.provenance,
            Provenance::Synthetic {
                seed: "1eb44d625271a4eb".to_string()
            }
        );
        assert!(!first.is_live());
    }

    #[test]
    fn test_reference_anchors_price() {
        let spec = SymbolSpec::new("GC=F", "Gold Futures", "USD", Some(2050.0));
        let quote = synthesize(&spec, Utc::now());
        assert_relative_eq!(quote.close, 2009.2, epsilon = 0.011);
        assert_relative_eq!(quote.change_percent.unwrap(), -0.62);
        // previous close is consistent with the reported change
        assert_relative_eq!(quote.effective_change_percent().unwrap(), -0.62, epsilon = 1e-9);
        assert!(quote.low <= quote.close && quote.close <= quote.high);
    }

    #[test]
    fn test_change_percent_range() {
        for symbol in ["^DJI", "^IXIC", "600519.SS", "300750.SZ", "TSLA", "XAUUSD=X"] {
            let change = synthetic_change_percent(seed(symbol));
            assert!((-1.0..=0.99).contains(&change), "{} -> {}", symbol, change);
        }
    }
}
