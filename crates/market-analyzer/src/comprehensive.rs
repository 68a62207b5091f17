//! Cross-market composition. Allocation mixes and correlation notes are fixed
//! templates, not statistics computed from the snapshots.

use std::cmp::Ordering;

use market_core::{
    AllocationTemplate, ComprehensiveReport, CrossMarketComparison, GlobalOverview, MarketAnalysis,
    MarketSnapshot, RankEntry, RiskAssessment, RiskLevel, Trend,
};

use crate::MarketAnalyzer;

const KEY_DRIVERS: [&str; 4] = [
    "Federal Reserve policy path",
    "Global inflation trend",
    "Geopolitical risk",
    "China economic recovery",
];

const ALLOCATIONS: [(&str, &str); 3] = [
    ("conservative", "60% US equities + 30% gold + 10% A-shares"),
    ("balanced", "50% US equities + 25% A-shares + 25% gold"),
    ("aggressive", "60% A-shares + 30% US equities + 10% gold"),
];

const CORRELATION_NOTES: [&str; 3] = [
    "Gold tends to move inversely to the US dollar",
    "US and Chinese equities show low to moderate correlation",
    "Gold and equities tend to diverge in risk-off periods",
];

const RISK_FACTORS: [&str; 3] = [
    "Uncertainty around the monetary policy path",
    "Geopolitical tension",
    "Pace of economic recovery",
];

const MITIGATIONS: [&str; 3] = [
    "Diversify across markets",
    "Size positions conservatively",
    "Set stop-loss levels in advance",
];

fn trend_phrase(trend: Trend) -> &'static str {
    match trend {
        Trend::StrongUp => "rallying strongly",
        Trend::MildUp => "edging higher",
        Trend::Flat => "moving sideways",
        Trend::MildDown => "drifting lower",
        Trend::StrongDown => "selling off",
        Trend::Unknown => "without usable data",
    }
}

fn global_overview(analyses: &[&MarketAnalysis; 3], us: &MarketSnapshot) -> GlobalOverview {
    let overall_status = match us.sentiment.value("fear_greed_index") {
        Some(v) if v > 55.0 => "Risk appetite recovering",
        Some(_) => "Cautious sentiment",
        None => "Sentiment data unavailable",
    };

    let summary = analyses
        .iter()
        .map(|a| format!("{} is {}", a.market.display_name(), trend_phrase(a.trend)))
        .collect::<Vec<_>>()
        .join("; ");

    GlobalOverview {
        overall_status: overall_status.to_string(),
        key_drivers: KEY_DRIVERS.iter().map(|d| d.to_string()).collect(),
        summary: format!("{}.", summary),
    }
}

/// Descending by change; markets without a change sort last, keeping their input order.
fn ranking(analyses: &[&MarketAnalysis; 3]) -> Vec<RankEntry> {
    let mut ranking: Vec<RankEntry> = analyses
        .iter()
        .map(|a| RankEntry {
            market: a.market,
            change_percent: a.change_percent,
        })
        .collect();

    ranking.sort_by(|a, b| match (a.change_percent, b.change_percent) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranking
}

fn key_insights(analyses: &[&MarketAnalysis; 3]) -> Vec<String> {
    let mut insights = Vec::new();
    for analysis in analyses {
        let name = analysis.market.display_name();
        match &analysis.overview {
            Some(overview) => insights.push(format!("{}: {}", name, overview.status)),
            None => insights.push(format!("{}: trend {}", name, analysis.trend.label())),
        }
        insights.push(format!("{} news sentiment is {}", name, analysis.sentiment.mood.label()));
    }

    let fallback: Vec<&str> = analyses
        .iter()
        .filter(|a| !a.live_data)
        .map(|a| a.market.display_name())
        .collect();
    if !fallback.is_empty() {
        insights.push(format!("Fallback data in use for: {}", fallback.join(", ")));
    }
    insights
}

fn risk_assessment(analyses: &[&MarketAnalysis; 3]) -> RiskAssessment {
    let overall_risk_level = if analyses.iter().any(|a| a.trend == Trend::StrongDown) {
        RiskLevel::High
    } else if analyses.iter().all(|a| a.trend == Trend::Unknown) {
        RiskLevel::Unknown
    } else {
        RiskLevel::Moderate
    };

    let mut risk_factors: Vec<String> = RISK_FACTORS.iter().map(|f| f.to_string()).collect();
    for analysis in analyses.iter().filter(|a| a.trend == Trend::StrongDown) {
        risk_factors.push(format!("Sharp decline in {}", analysis.market.display_name()));
    }

    RiskAssessment {
        overall_risk_level,
        risk_factors,
        mitigation_suggestions: MITIGATIONS.iter().map(|m| m.to_string()).collect(),
    }
}

impl MarketAnalyzer {
    /// Analyze all three markets and compose the cross-market report.
    ///
    /// `generated_at` is the latest collection time among the inputs so repeated
    /// calls on the same snapshots give identical reports.
    pub fn generate_comprehensive_analysis(
        &self,
        commodity: &MarketSnapshot,
        foreign_equity: &MarketSnapshot,
        domestic_equity: &MarketSnapshot,
    ) -> ComprehensiveReport {
        let gold = self.analyze(commodity);
        let us = self.analyze(foreign_equity);
        let cn = self.analyze(domestic_equity);
        let analyses = [&gold, &us, &cn];

        let generated_at = [commodity, foreign_equity, domestic_equity]
            .iter()
            .map(|s| s.collected_at)
            .max()
            .unwrap_or(commodity.collected_at);

        let global_overview = global_overview(&analyses, foreign_equity);
        let cross_market = CrossMarketComparison {
            ranking: ranking(&analyses),
            allocation: ALLOCATIONS
                .iter()
                .map(|(profile, mix)| AllocationTemplate {
                    profile: profile.to_string(),
                    mix: mix.to_string(),
                })
                .collect(),
            correlation_notes: CORRELATION_NOTES.iter().map(|n| n.to_string()).collect(),
            templated: true,
        };
        let key_insights = key_insights(&analyses);
        let risk_assessment = risk_assessment(&analyses);

        ComprehensiveReport {
            generated_at,
            global_overview,
            commodity: gold,
            foreign_equity: us,
            domestic_equity: cn,
            cross_market,
            key_insights,
            risk_assessment,
        }
    }
}
