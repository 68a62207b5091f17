//! Fundamental and technical commentary tables.

use market_core::{FactorStatus, FundamentalFactor, Market, Quote, SentimentSnapshot, TechnicalIndicator, Trend};

const INSUFFICIENT: &str = "insufficient data";

fn factor(key: &str, name: &str, status: FactorStatus, description: &str, impact: &str) -> FundamentalFactor {
    FundamentalFactor {
        key: key.to_string(),
        name: name.to_string(),
        status,
        description: description.to_string(),
        impact: impact.to_string(),
    }
}

fn unknown_factor(key: &str, name: &str, what: &str) -> FundamentalFactor {
    factor(key, name, FactorStatus::Unknown, &format!("{} unavailable", what), "unknown")
}

/// Sign of an indicator reading mapped to a factor; `None` when the indicator is absent.
fn by_sign(value: Option<f64>) -> Option<FactorStatus> {
    value.map(|v| {
        if v > 0.0 {
            FactorStatus::Positive
        } else if v < 0.0 {
            FactorStatus::Negative
        } else {
            FactorStatus::Neutral
        }
    })
}

pub fn fundamental_factors(market: Market, sentiment: &SentimentSnapshot) -> Vec<FundamentalFactor> {
    match market {
        Market::Commodity => {
            let dollar_change = sentiment.get("dollar_index").and_then(|i| i.change);
            // A rising dollar is a headwind for gold, so the sign is inverted
            let usd = match by_sign(dollar_change.map(|c| -c)) {
                Some(FactorStatus::Positive) => {
                    factor("usd_strength", "US dollar", FactorStatus::Positive, "Weaker dollar supports gold", "short-term positive")
                }
                Some(FactorStatus::Negative) => {
                    factor("usd_strength", "US dollar", FactorStatus::Negative, "Stronger dollar weighs on gold", "short-term negative")
                }
                Some(_) => factor("usd_strength", "US dollar", FactorStatus::Neutral, "Dollar is flat", "neutral"),
                None => unknown_factor("usd_strength", "US dollar", "Dollar index"),
            };

            vec![
                factor(
                    "inflation_hedge",
                    "Inflation hedge",
                    FactorStatus::Positive,
                    "Inflation expectations support gold demand",
                    "medium/long-term positive",
                ),
                usd,
                factor(
                    "geopolitical",
                    "Geopolitics",
                    FactorStatus::Positive,
                    "Geopolitical uncertainty supports safe-haven demand",
                    "short-term positive",
                ),
                factor(
                    "central_bank",
                    "Central bank buying",
                    FactorStatus::Positive,
                    "Global central banks keep adding to gold reserves",
                    "medium/long-term positive",
                ),
            ]
        }
        Market::ForeignEquity => {
            let volatility = match sentiment.value("vix_index") {
                Some(v) if v > 30.0 => factor(
                    "volatility",
                    "Volatility (VIX)",
                    FactorStatus::Negative,
                    "Elevated volatility signals stress",
                    "short-term negative",
                ),
                Some(v) if v > 20.0 => factor(
                    "volatility",
                    "Volatility (VIX)",
                    FactorStatus::Neutral,
                    "Volatility above its long-run average",
                    "neutral",
                ),
                Some(_) => factor(
                    "volatility",
                    "Volatility (VIX)",
                    FactorStatus::Positive,
                    "Low volatility supports risk appetite",
                    "short-term positive",
                ),
                None => unknown_factor("volatility", "Volatility (VIX)", "VIX"),
            };

            let appetite = match sentiment.value("fear_greed_index") {
                Some(v) if v > 55.0 => factor(
                    "risk_appetite",
                    "Risk appetite",
                    FactorStatus::Positive,
                    "Fear & Greed index in greed territory",
                    "short-term positive",
                ),
                Some(v) if v < 45.0 => factor(
                    "risk_appetite",
                    "Risk appetite",
                    FactorStatus::Negative,
                    "Fear & Greed index in fear territory",
                    "short-term negative",
                ),
                Some(_) => factor(
                    "risk_appetite",
                    "Risk appetite",
                    FactorStatus::Neutral,
                    "Fear & Greed index neutral",
                    "neutral",
                ),
                None => unknown_factor("risk_appetite", "Risk appetite", "Fear & Greed index"),
            };

            vec![
                volatility,
                appetite,
                factor(
                    "monetary_policy",
                    "Monetary policy",
                    FactorStatus::Neutral,
                    "The Fed policy path remains the key driver",
                    "medium-term",
                ),
                factor(
                    "earnings",
                    "Corporate earnings",
                    FactorStatus::Neutral,
                    "Earnings season shapes sector leadership",
                    "medium-term",
                ),
            ]
        }
        Market::DomesticEquity => {
            let flow = |key: &str, name: &str, indicator_key: &str, label: &str| match by_sign(sentiment.value(indicator_key)) {
                Some(FactorStatus::Positive) => factor(
                    key,
                    name,
                    FactorStatus::Positive,
                    &format!("{} capital is flowing in", label),
                    "short-term positive",
                ),
                Some(FactorStatus::Negative) => factor(
                    key,
                    name,
                    FactorStatus::Negative,
                    &format!("{} capital is flowing out", label),
                    "short-term negative",
                ),
                Some(_) => factor(key, name, FactorStatus::Neutral, &format!("{} flows are flat", label), "neutral"),
                None => unknown_factor(key, name, &format!("{} flow data", label)),
            };

            vec![
                flow("northbound_flow", "Northbound flow", "north_money", "Northbound"),
                flow("southbound_flow", "Southbound flow", "south_money", "Southbound"),
                factor(
                    "policy_support",
                    "Policy support",
                    FactorStatus::Positive,
                    "Supportive monetary and fiscal stance",
                    "medium-term positive",
                ),
                factor(
                    "sector_rotation",
                    "Sector rotation",
                    FactorStatus::Neutral,
                    "Fast sector rotation; follow the earnings themes",
                    "neutral",
                ),
            ]
        }
    }
}

fn indicator(name: &str, value: Option<f64>, reading: &str) -> TechnicalIndicator {
    TechnicalIndicator {
        name: name.to_string(),
        value,
        reading: reading.to_string(),
    }
}

/// Single-quote technical readings. Every row degrades to "insufficient data" without a price.
pub fn technical_indicators(quote: Option<&Quote>, change_percent: Option<f64>, trend: Trend) -> Vec<TechnicalIndicator> {
    let Some(quote) = quote else {
        return ["Range position", "Session direction", "Momentum", "SMA(5) gap"]
            .into_iter()
            .map(|name| indicator(name, None, INSUFFICIENT))
            .collect();
    };

    let range = quote.high - quote.low;
    let range_position = if range > 0.0 {
        let position = (quote.close - quote.low) / range * 100.0;
        let reading = if position >= 70.0 {
            "Closing near session high"
        } else if position <= 30.0 {
            "Closing near session low"
        } else {
            "Mid-range close"
        };
        indicator("Range position", Some(position), reading)
    } else {
        indicator("Range position", None, "No intraday range")
    };

    let body = quote.close - quote.open;
    let direction_reading = if body > 0.0 {
        "Closed above open"
    } else if body < 0.0 {
        "Closed below open"
    } else {
        "Unchanged from open"
    };

    let momentum_reading = match trend {
        Trend::StrongUp => "Strong upward momentum",
        Trend::MildUp => "Mild upward momentum",
        Trend::Flat => "No clear momentum",
        Trend::MildDown => "Mild downward momentum",
        Trend::StrongDown => "Strong downward momentum",
        Trend::Unknown => INSUFFICIENT,
    };

    let sma_gap = match quote.sma_5.filter(|s| *s > 0.0) {
        Some(sma) => {
            let gap = (quote.close - sma) / sma * 100.0;
            let reading = if gap > 0.0 {
                "Above 5-day average"
            } else if gap < 0.0 {
                "Below 5-day average"
            } else {
                "At 5-day average"
            };
            indicator("SMA(5) gap", Some(gap), reading)
        }
        None => indicator("SMA(5) gap", None, INSUFFICIENT),
    };

    vec![
        range_position,
        indicator("Session direction", Some(body), direction_reading),
        indicator("Momentum", change_percent, momentum_reading),
        sma_gap,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use market_core::SentimentIndicator;

    #[test]
    fn test_absent_indicator_is_unknown() {
        let factors = fundamental_factors(Market::ForeignEquity, &SentimentSnapshot::default());
        let vol = factors.iter().find(|f| f.key == "volatility").unwrap();
        assert_eq!(vol.status, FactorStatus::Unknown);
        let appetite = factors.iter().find(|f| f.key == "risk_appetite").unwrap();
        assert_eq!(appetite.status, FactorStatus::Unknown);
    }

    #[test]
    fn test_flow_and_dollar_conditionals() {
        let mut sentiment = SentimentSnapshot::default();
        sentiment.insert("north_money", SentimentIndicator::new(Some(-12.5), "outflow"));
        let cn = fundamental_factors(Market::DomesticEquity, &sentiment);
        assert_eq!(cn[0].status, FactorStatus::Negative);
        assert_eq!(cn[1].status, FactorStatus::Unknown);

        let mut dollar = SentimentIndicator::new(Some(104.2), "strong");
        dollar.change = Some(0.4);
        let mut sentiment = SentimentSnapshot::default();
        sentiment.insert("dollar_index", dollar);
        let gold = fundamental_factors(Market::Commodity, &sentiment);
        let usd = gold.iter().find(|f| f.key == "usd_strength").unwrap();
        assert_eq!(usd.status, FactorStatus::Negative);
    }

    #[test]
    fn test_technicals_without_price() {
        let rows = technical_indicators(None, None, Trend::Unknown);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.value.is_none() && r.reading == INSUFFICIENT));
    }

    #[test]
    fn test_range_position() {
        let quote = Quote {
            symbol: "GC=F".to_string(),
            name: "Gold Futures".to_string(),
            open: 2040.0,
            high: 2060.0,
            low: 2035.0,
            close: 2055.0,
            volume: None,
            currency: "USD".to_string(),
            timestamp: chrono::Utc::now(),
            previous_close: None,
            change: None,
            change_percent: None,
            sma_5: Some(2050.0),
            sma_10: None,
            provenance: market_core::Provenance::live("Yahoo Finance"),
        };
        let rows = technical_indicators(Some(&quote), Some(0.5), Trend::MildUp);
        assert_relative_eq!(rows[0].value.unwrap(), 80.0);
        assert_eq!(rows[0].reading, "Closing near session high");
        assert_eq!(rows[1].reading, "Closed above open");
        assert_relative_eq!(rows[3].value.unwrap(), 5.0 / 2050.0 * 100.0, epsilon = 1e-9);
    }
}
