//! Pure interpretation of collected market snapshots.
//!
//! Nothing here performs I/O or mutates state: for a given configuration the same
//! snapshot always yields the same [`MarketAnalysis`].

use std::collections::BTreeMap;

use market_core::{Market, MarketAnalysis, MarketSnapshot, PipelineConfig, Quote, QuoteEntry, Trend};
use tracing::debug;

mod comprehensive;
pub mod equity;
pub mod narrative;
pub mod tables;

const SUPPORT_OFFSETS: [f64; 3] = [0.98, 0.95, 0.92];
const RESISTANCE_OFFSETS: [f64; 3] = [1.02, 1.05, 1.08];

fn default_currency(market: Market) -> &'static str {
    match market {
        Market::DomesticEquity => "CNY",
        Market::Commodity | Market::ForeignEquity => "USD",
    }
}

/// Fixed percentage bands below (descending) and above (ascending) the price.
pub fn price_levels(price: Option<f64>) -> (Vec<f64>, Vec<f64>) {
    match price {
        Some(p) if p.is_finite() && p > 0.0 => (
            SUPPORT_OFFSETS.iter().map(|o| p * o).collect(),
            RESISTANCE_OFFSETS.iter().map(|o| p * o).collect(),
        ),
        _ => (Vec::new(), Vec::new()),
    }
}

/// Interprets snapshots using the benchmark preferences of the configured market profiles.
#[derive(Debug, Clone)]
pub struct MarketAnalyzer {
    benchmarks: BTreeMap<Market, Vec<String>>,
}

impl Default for MarketAnalyzer {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl MarketAnalyzer {
    pub fn new(config: &PipelineConfig) -> Self {
        let benchmarks = config
            .markets
            .iter()
            .map(|profile| (profile.market, profile.benchmarks.clone()))
            .collect();
        Self { benchmarks }
    }

    /// Symbols tried in order for `market`; empty when the market has no profile.
    pub fn benchmarks(&self, market: Market) -> &[String] {
        self.benchmarks.get(&market).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The market's headline quote: the first configured benchmark present, else
    /// the first available quote of the first sub-market.
    pub fn benchmark_quote<'a>(&self, snapshot: &'a MarketSnapshot) -> Option<&'a Quote> {
        self.benchmarks(snapshot.market)
            .iter()
            .find_map(|symbol| snapshot.quote(symbol).and_then(QuoteEntry::quote))
            .or_else(|| snapshot.sub_markets.first().and_then(|s| s.available().next()))
    }

    pub fn analyze(&self, snapshot: &MarketSnapshot) -> MarketAnalysis {
        let market = snapshot.market;
        let benchmark = self.benchmark_quote(snapshot);

        let current_price = benchmark.map(|q| q.close);
        let change_percent = benchmark.and_then(Quote::effective_change_percent);
        let trend = Trend::classify(change_percent);
        let (support_levels, resistance_levels) = price_levels(current_price);

        let (overview, index_table) = if market.is_equity() {
            let rows = equity::index_table(snapshot);
            (Some(equity::overview(snapshot, &rows)), rows)
        } else {
            (None, Vec::new())
        };

        let driver = match &overview {
            Some(o) => o.average_change_percent,
            None => change_percent,
        };
        let levels = support_levels.first().copied().zip(resistance_levels.first().copied());

        let live_data = snapshot.entries().next().is_some() && snapshot.entries().all(QuoteEntry::is_live);

        debug!(
            "analyzed {}: benchmark={:?} change={:?} trend={}",
            market.key(),
            benchmark.map(|q| q.symbol.as_str()),
            change_percent,
            trend.label()
        );

        MarketAnalysis {
            market,
            as_of: snapshot.collected_at,
            benchmark: benchmark.map(|q| q.symbol.clone()),
            currency: benchmark
                .map(|q| q.currency.clone())
                .unwrap_or_else(|| default_currency(market).to_string()),
            current_price,
            change_percent,
            trend,
            support_levels,
            resistance_levels,
            fundamental_factors: tables::fundamental_factors(market, &snapshot.sentiment),
            technical_indicators: tables::technical_indicators(benchmark, change_percent, trend),
            sentiment: narrative::summarize_news(&snapshot.news),
            overview,
            index_table,
            outlook: narrative::outlook(market, driver, levels),
            recommendation: narrative::recommendation(market, driver),
            live_data,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use approx::assert_relative_eq;
    use market_core::{FactorStatus, PipelineConfig, RiskLevel, SubMarket};

    #[test]
    fn test_gold_end_to_end() {
        let analysis = MarketAnalyzer::default().analyze(&gold(2050.30, 2041.20));

        assert_eq!(analysis.benchmark.as_deref(), Some("GC=F"));
        assert_relative_eq!(analysis.current_price.unwrap(), 2050.30);
        assert_relative_eq!(analysis.change_percent.unwrap(), 0.4458, epsilon = 1e-3);
        assert_eq!(analysis.trend, Trend::MildUp);

        let supports = [2009.29, 1947.785, 1886.276];
        let resistances = [2091.306, 2152.815, 2214.324];
        assert_eq!(analysis.support_levels.len(), 3);
        for (actual, expected) in analysis.support_levels.iter().zip(supports) {
            assert_relative_eq!(*actual, expected, epsilon = 1e-2);
        }
        for (actual, expected) in analysis.resistance_levels.iter().zip(resistances) {
            assert_relative_eq!(*actual, expected, epsilon = 1e-2);
        }
        assert!(analysis.support_levels.windows(2).all(|w| w[0] > w[1]));
        assert!(analysis.resistance_levels.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(analysis.currency, "USD");
        assert!(analysis.live_data);
        assert!(analysis.overview.is_none());
        assert_eq!(analysis.recommendation.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_analyze_is_pure() {
        let snapshot = gold(2050.30, 2041.20);
        let first = serde_json::to_string(&MarketAnalyzer::default().analyze(&snapshot)).unwrap();
        let second = serde_json::to_string(&MarketAnalyzer::default().analyze(&snapshot)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_price_degrades_to_unknown() {
        let snapshot = snapshot(Market::Commodity, vec![SubMarket::new("futures", Vec::new())]);
        let analysis = MarketAnalyzer::default().analyze(&snapshot);

        assert_eq!(analysis.current_price, None);
        assert_eq!(analysis.change_percent, None);
        assert_eq!(analysis.trend, Trend::Unknown);
        assert!(analysis.support_levels.is_empty());
        assert!(analysis.resistance_levels.is_empty());
        assert!(analysis.technical_indicators.iter().all(|t| t.value.is_none()));
        assert_eq!(analysis.recommendation.risk_level, RiskLevel::Unknown);
        assert_eq!(analysis.outlook, "Insufficient data for an outlook.");
        assert!(!analysis.live_data);
        let usd = analysis.fundamental_factors.iter().find(|f| f.key == "usd_strength").unwrap();
        assert_eq!(usd.status, FactorStatus::Unknown);
    }

    #[test]
    fn test_no_previous_close_is_unknown_not_flat() {
        let snapshot = snapshot(
            Market::Commodity,
            vec![SubMarket::new("spot", vec![quote("XAUUSD=X", "USD", 2045.0, None)])],
        );
        let analysis = MarketAnalyzer::default().analyze(&snapshot);
        assert_eq!(analysis.current_price, Some(2045.0));
        assert_eq!(analysis.trend, Trend::Unknown);
        assert_eq!(analysis.support_levels.len(), 3);
    }

    #[test]
    fn test_equity_benchmark_falls_back_to_first_index() {
        let snapshot = equity(
            Market::ForeignEquity,
            "USD",
            &[("^DJI", 38_380.0, 38_000.0), ("^IXIC", 15_060.0, 15_000.0)],
        );
        let analysis = MarketAnalyzer::default().analyze(&snapshot);

        assert_eq!(analysis.benchmark.as_deref(), Some("^DJI"));
        assert_eq!(analysis.index_table.len(), 2);
        let overview = analysis.overview.as_ref().unwrap();
        // (1.0 + 0.4) / 2
        assert_relative_eq!(overview.average_change_percent.unwrap(), 0.7, epsilon = 1e-9);
        assert_eq!(overview.status, "strong advance");
        assert_eq!(analysis.recommendation.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_configured_benchmarks_drive_selection() {
        let snapshot = equity(
            Market::ForeignEquity,
            "USD",
            &[("^DJI", 38_380.0, 38_000.0), ("^IXIC", 15_060.0, 15_000.0)],
        );

        let mut config = PipelineConfig::default();
        for profile in &mut config.markets {
            if profile.market == Market::ForeignEquity {
                profile.benchmarks = vec!["^RUT".to_string(), "^IXIC".to_string()];
            }
        }
        let analyzer = MarketAnalyzer::new(&config);
        assert_eq!(analyzer.benchmarks(Market::ForeignEquity), ["^RUT", "^IXIC"]);

        let analysis = analyzer.analyze(&snapshot);
        assert_eq!(analysis.benchmark.as_deref(), Some("^IXIC"));
        assert_relative_eq!(analysis.change_percent.unwrap(), 0.4, epsilon = 1e-9);

        config.markets.retain(|p| p.market != Market::ForeignEquity);
        let analyzer = MarketAnalyzer::new(&config);
        assert!(analyzer.benchmarks(Market::ForeignEquity).is_empty());
        assert_eq!(analyzer.analyze(&snapshot).benchmark.as_deref(), Some("^DJI"));
    }

    #[test]
    fn test_domestic_currency_default() {
        let snapshot = snapshot(Market::DomesticEquity, Vec::new());
        let analysis = MarketAnalyzer::default().analyze(&snapshot);
        assert_eq!(analysis.currency, "CNY");
        assert_eq!(analysis.overview.as_ref().unwrap().status, "insufficient data");
    }

    #[test]
    fn test_comprehensive_ranking_and_risk() {
        let gold = gold(2050.30, 2041.20);
        let us = equity(Market::ForeignEquity, "USD", &[("^GSPC", 4_900.0, 5_000.0)]);
        let cn = snapshot(Market::DomesticEquity, Vec::new());

        let report = MarketAnalyzer::default().generate_comprehensive_analysis(&gold, &us, &cn);

        let order: Vec<Market> = report.cross_market.ranking.iter().map(|r| r.market).collect();
        assert_eq!(order, vec![Market::Commodity, Market::ForeignEquity, Market::DomesticEquity]);
        assert_eq!(report.cross_market.ranking[2].change_percent, None);
        assert!(report.cross_market.templated);
        assert_eq!(report.cross_market.allocation.len(), 3);

        // ^GSPC -2% is strong-down
        assert_eq!(report.foreign_equity.trend, Trend::StrongDown);
        assert_eq!(report.risk_assessment.overall_risk_level, RiskLevel::High);
        assert!(report
            .risk_assessment
            .risk_factors
            .iter()
            .any(|f| f == "Sharp decline in US Stocks"));
        assert_eq!(report.global_overview.overall_status, "Sentiment data unavailable");
        assert!(report.key_insights.iter().any(|i| i.starts_with("Fallback data in use for")));
        assert_eq!(report.generated_at, gold.collected_at);
    }

    #[test]
    fn test_comprehensive_all_unknown() {
        let empty = |m| snapshot(m, Vec::new());
        let report = MarketAnalyzer::default().generate_comprehensive_analysis(
            &empty(Market::Commodity),
            &empty(Market::ForeignEquity),
            &empty(Market::DomesticEquity),
        );
        assert_eq!(report.risk_assessment.overall_risk_level, RiskLevel::Unknown);
    }
}
