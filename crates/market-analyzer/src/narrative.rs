use std::collections::BTreeSet;

use market_core::{Confidence, Market, Mood, NewsItem, NewsSentiment, Recommendation, RiskLevel, SentimentSummary};

/// Headline keywords mapped to the theme they signal.
const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    ("Monetary policy", &["fed", "fomc", "rate decision", "interest rate", "pboc", "repo"]),
    ("Inflation expectations", &["inflation", "cpi"]),
    ("Safe-haven demand", &["safe-haven", "safe haven", "geopolit"]),
    ("Dollar strength", &["dollar"]),
    ("Economic data", &["pmi", "payrolls", "gdp"]),
];

fn key_themes(news: &[NewsItem]) -> Vec<String> {
    let mut themes = BTreeSet::new();
    for item in news {
        let title = item.title.to_lowercase();
        for (theme, keywords) in THEME_KEYWORDS {
            if keywords.iter().any(|k| title.contains(k)) {
                themes.insert(theme.to_string());
            }
        }
    }
    themes.into_iter().collect()
}

/// Majority vote over news tags; ties and empty input are neutral with low confidence.
pub fn summarize_news(news: &[NewsItem]) -> SentimentSummary {
    let count = |tag: NewsSentiment| news.iter().filter(|n| n.sentiment == tag).count();
    let positive_count = count(NewsSentiment::Positive);
    let negative_count = count(NewsSentiment::Negative);
    let neutral_count = count(NewsSentiment::Neutral);

    let (mood, confidence) = if positive_count > negative_count {
        (Mood::Positive, Confidence::Medium)
    } else if negative_count > positive_count {
        (Mood::Negative, Confidence::Medium)
    } else {
        (Mood::Neutral, Confidence::Low)
    };

    SentimentSummary {
        mood,
        positive_count,
        negative_count,
        neutral_count,
        confidence,
        key_themes: key_themes(news),
    }
}

/// Symmetric band around zero separating bullish, neutral and bearish outlooks.
fn outlook_band(market: Market) -> f64 {
    match market {
        Market::Commodity => 0.5,
        Market::ForeignEquity => 0.3,
        Market::DomesticEquity => 0.2,
    }
}

fn recommendation_band(market: Market) -> f64 {
    match market {
        Market::Commodity | Market::ForeignEquity => 1.0,
        Market::DomesticEquity => 0.5,
    }
}

/// Templated outlook keyed on `change` (benchmark change for gold, average index
/// change for equities). `levels` is `(first support, first resistance)`.
pub fn outlook(market: Market, change: Option<f64>, levels: Option<(f64, f64)>) -> String {
    let Some(change) = change else {
        return "Insufficient data for an outlook.".to_string();
    };
    let band = outlook_band(market);

    match market {
        Market::Commodity => {
            let (support, resistance) = match levels {
                Some((s, r)) => (format!("{:.2}", s), format!("{:.2}", r)),
                None => ("the nearest support".to_string(), "the nearest resistance".to_string()),
            };
            if change > band {
                format!(
                    "Gold remains firm; a break above {} would open further upside. Safe-haven demand and central bank buying provide support.",
                    resistance
                )
            } else if change < -band {
                format!(
                    "Gold is under pressure; watch support near {}. A break lower could extend the pullback.",
                    support
                )
            } else {
                format!("Gold is range-bound between {} and {}; wait for a breakout direction.", support, resistance)
            }
        }
        Market::ForeignEquity => {
            if change > band {
                "The major US indices are rising together with upbeat sentiment. Tech leadership and solid volume favor a continuation in the short term.".to_string()
            } else if change < -band {
                "The major US indices are broadly lower. Watch earnings and the Fed policy path; the medium-term trend needs confirmation.".to_string()
            } else {
                "US stocks are consolidating with mixed moves. Investors are cautious and waiting for more economic data.".to_string()
            }
        }
        Market::DomesticEquity => {
            if change > band {
                "A-shares are grinding higher on moderately rising turnover. Supportive policy is lifting sentiment.".to_string()
            } else if change < -band {
                "A-shares are consolidating lower. Confidence needs to rebuild; low-valuation blue chips deserve attention.".to_string()
            } else {
                "A-shares are trading in a narrow range ahead of a directional move. Watch turnover and foreign capital flows.".to_string()
            }
        }
    }
}

pub fn recommendation(market: Market, change: Option<f64>) -> Recommendation {
    let make = |action: &str, reason: &str, risk_level: RiskLevel| Recommendation {
        action: action.to_string(),
        reason: reason.to_string(),
        risk_level,
    };

    let Some(change) = change else {
        return make("Hold off", "Insufficient data for a recommendation", RiskLevel::Unknown);
    };
    let band = recommendation_band(market);

    match market {
        Market::Commodity => {
            if change > band {
                make("Avoid chasing highs", "Large short-term gain; wait for a pullback before entering", RiskLevel::Moderate)
            } else if change < -band {
                make("Watch support", "Consider scaling in after the pullback", RiskLevel::ModerateHigh)
            } else {
                make("Wait and see", "Direction unclear; keep positions light", RiskLevel::Low)
            }
        }
        Market::ForeignEquity => {
            if change > band {
                make("Trim exposure", "Large short-term gains; beware of a pullback", RiskLevel::Moderate)
            } else if change < -band {
                make("Buy the dip selectively", "Quality names are worth accumulating on weakness", RiskLevel::ModerateHigh)
            } else {
                make("Hold", "Direction unclear; keep current positions", RiskLevel::Low)
            }
        }
        Market::DomesticEquity => {
            if change > band {
                make("Trim exposure", "Lock in part of the short-term gains", RiskLevel::Moderate)
            } else if change < -band {
                make("Build positions gradually", "The pullback offers entry into quality names", RiskLevel::ModerateHigh)
            } else {
                make("Hold for upside", "The market is basing; stay patient", RiskLevel::Low)
            }
        }
    }
}
