//! Markdown rendering of a [`ComprehensiveReport`] plus the raw snapshots it came from.

pub mod format;

use market_core::{
    ComprehensiveReport, Market, MarketAnalysis, MarketSnapshot, NewsSentiment, QuoteEntry, SnapshotSet,
};

pub use format::{format_number, format_percent, format_price, parse_percent, parse_price, NOT_AVAILABLE};

pub const NO_DATA: &str = "_No data available._";

pub const REPORT_TITLE: &str = "Financial Market Report";

/// Line-oriented Markdown buffer.
#[derive(Default)]
struct Markdown {
    buf: String,
}

impl Markdown {
    fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
        self
    }

    fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    fn heading(&mut self, level: usize, text: &str) -> &mut Self {
        self.line(format!("{} {}", "#".repeat(level), text)).blank()
    }

    fn bullet(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(format!("- {}", text.as_ref()))
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) -> &mut Self {
        self.line(format!("| {} |", headers.join(" | ")));
        self.line(format!("|{}", "---|".repeat(headers.len())));
        for row in rows {
            let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
            self.line(format!("| {} |", cells.join(" | ")));
        }
        self.blank()
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or(NOT_AVAILABLE)
}

fn news_tag(sentiment: NewsSentiment) -> &'static str {
    match sentiment {
        NewsSentiment::Positive => "positive",
        NewsSentiment::Neutral => "neutral",
        NewsSentiment::Negative => "negative",
    }
}

fn render_header(md: &mut Markdown, report: Option<&ComprehensiveReport>, snapshots: &SnapshotSet) {
    md.heading(1, REPORT_TITLE);
    let generated = report
        .map(|r| r.generated_at)
        .or_else(|| Market::ALL.iter().filter_map(|m| snapshots.get(*m)).map(|s| s.collected_at).max());
    match generated {
        Some(at) => md.bullet(format!("Generated: {}", at.format("%Y-%m-%d %H:%M UTC"))),
        None => md.bullet(format!("Generated: {}", NOT_AVAILABLE)),
    };
    md.bullet(format!(
        "Markets: {}",
        Market::ALL.iter().map(|m| m.display_name()).collect::<Vec<_>>().join(", ")
    ));
    for market in Market::ALL {
        let status = snapshots.get(market).map(|s| s.metadata.status.label());
        md.bullet(format!("{} data: {}", market.display_name(), or_na(status)));
    }
    md.blank();
}

fn render_global_overview(md: &mut Markdown, report: Option<&ComprehensiveReport>) {
    md.heading(2, "Global Overview");
    let Some(report) = report else {
        md.line(NO_DATA).blank();
        return;
    };
    let overview = &report.global_overview;
    md.line(format!("**Status:** {}", overview.overall_status)).blank();
    md.line(&overview.summary).blank();
    md.line("**Key drivers:**").blank();
    for driver in &overview.key_drivers {
        md.bullet(driver);
    }
    md.blank();
}

fn render_sentiment_table(md: &mut Markdown, snapshots: &SnapshotSet) {
    md.heading(2, "Market Sentiment");
    let rows: Vec<Vec<String>> = Market::ALL
        .iter()
        .filter_map(|m| snapshots.get(*m))
        .flat_map(|snapshot| {
            snapshot.sentiment.indicators.iter().map(move |(key, indicator)| {
                let value = match (&indicator.unit, indicator.value) {
                    (Some(unit), Some(_)) => format!("{} {}", format_number(indicator.value), unit),
                    _ => format_number(indicator.value),
                };
                vec![
                    snapshot.market.display_name().to_string(),
                    key.clone(),
                    value,
                    format_percent(indicator.change),
                    match &indicator.level {
                        Some(level) => format!("{} ({})", indicator.interpretation, level),
                        None => indicator.interpretation.clone(),
                    },
                ]
            })
        })
        .collect();

    if rows.is_empty() {
        md.line(NO_DATA).blank();
    } else {
        md.table(&["Market", "Indicator", "Value", "Change", "Interpretation"], &rows);
    }
}

fn render_quotes(md: &mut Markdown, snapshot: &MarketSnapshot) {
    for sub_market in &snapshot.sub_markets {
        md.heading(4, &format!("Quotes: {}", sub_market.name));
        let rows: Vec<Vec<String>> = sub_market
            .quotes
            .iter()
            .map(|entry| match entry {
                QuoteEntry::Available(q) => vec![
                    q.symbol.clone(),
                    q.name.clone(),
                    format_price(Some(q.close), &q.currency),
                    format_percent(q.effective_change_percent()),
                    q.provenance.label(),
                ],
                QuoteEntry::Missing(m) => vec![
                    m.symbol.clone(),
                    m.name.clone(),
                    NOT_AVAILABLE.to_string(),
                    NOT_AVAILABLE.to_string(),
                    format!("missing ({})", m.error),
                ],
            })
            .collect();
        if rows.is_empty() {
            md.line(NO_DATA).blank();
        } else {
            md.table(&["Symbol", "Name", "Close", "Change", "Source"], &rows);
        }
    }
}

fn render_levels(values: &[f64], currency: &str) -> String {
    if values.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        values
            .iter()
            .map(|v| format_price(Some(*v), currency))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

fn render_analysis(md: &mut Markdown, analysis: &MarketAnalysis) {
    let currency = analysis.currency.as_str();

    md.line(format!("**Benchmark:** {}", or_na(analysis.benchmark.as_deref())));
    md.line(format!(
        "**Current price:** {} ({})",
        format_price(analysis.current_price, currency),
        format_percent(analysis.change_percent)
    ));
    md.line(format!("**Trend:** {}", analysis.trend.label()));
    md.line(format!("**Support:** {}", render_levels(&analysis.support_levels, currency)));
    md.line(format!("**Resistance:** {}", render_levels(&analysis.resistance_levels, currency)));
    if !analysis.live_data {
        md.line("**Note:** includes fallback or missing data");
    }
    md.blank();

    if let Some(overview) = &analysis.overview {
        md.heading(3, "Market Overview");
        md.bullet(format!("Status: {}", overview.status));
        md.bullet(format!("Average index change: {}", format_percent(overview.average_change_percent)));
        md.bullet(format!("Breadth (advance:decline): {}", or_na(overview.breadth.label().as_deref())));
        let movers = |list: &[market_core::Mover]| {
            if list.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                list.iter()
                    .map(|m| format!("{} {}", m.name, format_percent(Some(m.change_percent))))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        };
        md.bullet(format!("Leaders: {}", movers(&overview.leaders)));
        md.bullet(format!("Laggards: {}", movers(&overview.laggards)));
        md.blank();
    }

    if !analysis.index_table.is_empty() {
        md.heading(3, "Indices");
        let rows: Vec<Vec<String>> = analysis
            .index_table
            .iter()
            .map(|row| {
                vec![
                    row.name.clone(),
                    format_price(row.close, currency),
                    format_percent(row.change_percent),
                    row.trend.label().to_string(),
                ]
            })
            .collect();
        md.table(&["Index", "Close", "Change", "Trend"], &rows);
    }

    md.heading(3, "Fundamental Factors");
    let rows: Vec<Vec<String>> = analysis
        .fundamental_factors
        .iter()
        .map(|f| vec![f.name.clone(), f.status.label().to_string(), f.description.clone(), f.impact.clone()])
        .collect();
    md.table(&["Factor", "Status", "Description", "Impact"], &rows);

    md.heading(3, "Technical Indicators");
    let rows: Vec<Vec<String>> = analysis
        .technical_indicators
        .iter()
        .map(|t| vec![t.name.clone(), format_number(t.value), t.reading.clone()])
        .collect();
    md.table(&["Indicator", "Value", "Reading"], &rows);

    md.heading(3, "News Sentiment");
    let sentiment = &analysis.sentiment;
    md.bullet(format!(
        "Mood: {} (confidence {})",
        sentiment.mood.label(),
        sentiment.confidence.label()
    ));
    md.bullet(format!(
        "Positive / neutral / negative: {} / {} / {}",
        sentiment.positive_count, sentiment.neutral_count, sentiment.negative_count
    ));
    if sentiment.key_themes.is_empty() {
        md.bullet(format!("Themes: {}", NOT_AVAILABLE));
    } else {
        md.bullet(format!("Themes: {}", sentiment.key_themes.join(", ")));
    }
    md.blank();

    md.heading(3, "Outlook");
    md.line(&analysis.outlook).blank();

    md.heading(3, "Recommendation");
    let rec = &analysis.recommendation;
    md.bullet(format!("Action: {}", rec.action));
    md.bullet(format!("Reason: {}", rec.reason));
    md.bullet(format!("Risk level: {}", rec.risk_level.label()));
    md.blank();
}

fn render_headlines(md: &mut Markdown, snapshot: &MarketSnapshot) {
    if snapshot.news.is_empty() {
        return;
    }
    md.heading(3, "Headlines");
    for item in &snapshot.news {
        let mut line = format!("[{}]({}) ({}, {})", item.title, item.url, item.source, news_tag(item.sentiment));
        if let Some(summary) = &item.summary {
            line.push_str(&format!(": {}", summary));
        }
        md.bullet(line);
    }
    md.blank();
}

fn render_market(md: &mut Markdown, market: Market, report: Option<&ComprehensiveReport>, snapshots: &SnapshotSet) {
    md.heading(2, market.display_name());
    let snapshot = snapshots.get(market);

    match report.map(|r| r.market(market)) {
        Some(analysis) => render_analysis(md, analysis),
        None => {
            md.line(NO_DATA).blank();
        }
    }

    if let Some(snapshot) = snapshot {
        render_headlines(md, snapshot);
        render_quotes(md, snapshot);
    }
}

fn render_cross_market(md: &mut Markdown, report: Option<&ComprehensiveReport>) {
    md.heading(2, "Cross-Market Comparison");
    let Some(report) = report else {
        md.line(NO_DATA).blank();
        return;
    };
    let cross = &report.cross_market;

    let rows: Vec<Vec<String>> = cross
        .ranking
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            vec![
                (i + 1).to_string(),
                entry.market.display_name().to_string(),
                format_percent(entry.change_percent),
            ]
        })
        .collect();
    md.table(&["Rank", "Market", "Change"], &rows);

    if cross.templated {
        md.line("_Allocation templates and correlation notes are fixed guidance, not computed statistics._")
            .blank();
    }
    md.line("**Allocation templates:**").blank();
    for template in &cross.allocation {
        md.bullet(format!("{}: {}", template.profile, template.mix));
    }
    md.blank();
    md.line("**Correlation notes:**").blank();
    for note in &cross.correlation_notes {
        md.bullet(note);
    }
    md.blank();
}

fn render_insights(md: &mut Markdown, report: Option<&ComprehensiveReport>) {
    md.heading(2, "Key Insights");
    match report {
        Some(report) if !report.key_insights.is_empty() => {
            for insight in &report.key_insights {
                md.bullet(insight);
            }
            md.blank();
        }
        _ => {
            md.line(NO_DATA).blank();
        }
    }
}

fn render_risk(md: &mut Markdown, report: Option<&ComprehensiveReport>) {
    md.heading(2, "Risk Assessment");
    let Some(report) = report else {
        md.line(NO_DATA).blank();
        return;
    };
    let risk = &report.risk_assessment;
    md.line(format!("**Overall risk level:** {}", risk.overall_risk_level.label())).blank();
    md.line("**Risk factors:**").blank();
    for factor in &risk.risk_factors {
        md.bullet(factor);
    }
    md.blank();
    md.line("**Mitigation:**").blank();
    for suggestion in &risk.mitigation_suggestions {
        md.bullet(suggestion);
    }
    md.blank();
}

fn render_sources(md: &mut Markdown, snapshots: &SnapshotSet) {
    md.heading(2, "Data Sources");
    for market in Market::ALL {
        let Some(snapshot) = snapshots.get(market) else {
            md.bullet(format!("{}: {}", market.display_name(), NO_DATA));
            continue;
        };
        let meta = &snapshot.metadata;
        let list = |items: &[String]| {
            if items.is_empty() {
                "none".to_string()
            } else {
                items.join(", ")
            }
        };
        md.bullet(format!(
            "{}: collected {}; live sources: {}; failed: {}; fallback symbols: {}",
            market.display_name(),
            snapshot.collected_at.format("%Y-%m-%d %H:%M UTC"),
            list(&meta.sources_ok),
            list(&meta.sources_failed),
            list(&meta.fallback_symbols),
        ));
        if let Some(note) = &meta.note {
            md.line(format!("  - {}", note));
        }
    }
    md.blank();
}

fn render_disclaimer(md: &mut Markdown) {
    md.heading(2, "Disclaimer");
    md.line(
        "This report is generated automatically for informational purposes only and is not investment advice. \
         Fallback values are synthetic placeholders and do not reflect real prices.",
    );
}

/// Render the full report. Never fails: absent analyses or snapshots become placeholders.
pub fn render(report: Option<&ComprehensiveReport>, snapshots: &SnapshotSet) -> String {
    let mut md = Markdown::default();
    render_header(&mut md, report, snapshots);
    render_global_overview(&mut md, report);
    render_sentiment_table(&mut md, snapshots);
    for market in Market::ALL {
        render_market(&mut md, market, report, snapshots);
    }
    render_cross_market(&mut md, report);
    render_insights(&mut md, report);
    render_risk(&mut md, report);
    render_sources(&mut md, snapshots);
    render_disclaimer(&mut md);
    md.buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use market_core::{
        AllocationTemplate, Breadth, CollectionMetadata, CollectionStatus, Confidence, CrossMarketComparison,
        GlobalOverview, IndexRow, MarketOverview, Mood, Provenance, Quote, RankEntry, Recommendation, RiskAssessment,
        RiskLevel, SentimentIndicator, SentimentSnapshot, SentimentSummary, SubMarket, Trend,
    };

    fn analysis(market: Market, price: Option<f64>, change: Option<f64>, currency: &str) -> MarketAnalysis {
        MarketAnalysis {
            market,
            as_of: Utc.with_ymd_and_hms(2024, 3, 1, 21, 5, 0).unwrap(),
            benchmark: price.map(|_| "BENCH".to_string()),
            currency: currency.to_string(),
            current_price: price,
            change_percent: change,
            trend: Trend::classify(change),
            support_levels: price.map(|p| vec![p * 0.98, p * 0.95, p * 0.92]).unwrap_or_default(),
            resistance_levels: price.map(|p| vec![p * 1.02, p * 1.05, p * 1.08]).unwrap_or_default(),
            fundamental_factors: Vec::new(),
            technical_indicators: Vec::new(),
            sentiment: SentimentSummary {
                mood: Mood::Neutral,
                positive_count: 0,
                negative_count: 0,
                neutral_count: 0,
                confidence: Confidence::Low,
                key_themes: Vec::new(),
            },
            overview: market.is_equity().then(|| MarketOverview {
                status: "mild advance".to_string(),
                average_change_percent: change,
                breadth: Breadth { advance: 2, decline: 1 },
                leaders: Vec::new(),
                laggards: Vec::new(),
            }),
            index_table: if market.is_equity() {
                vec![IndexRow {
                    symbol: "IDX".to_string(),
                    name: "Composite".to_string(),
                    close: None,
                    change_percent: None,
                    trend: Trend::Unknown,
                    live: false,
                }]
            } else {
                Vec::new()
            },
            outlook: "Range-bound.".to_string(),
            recommendation: Recommendation {
                action: "Hold".to_string(),
                reason: "No edge".to_string(),
                risk_level: RiskLevel::Low,
            },
            live_data: true,
        }
    }

    fn report() -> ComprehensiveReport {
        ComprehensiveReport {
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 21, 5, 0).unwrap(),
            global_overview: GlobalOverview {
                overall_status: "Cautious sentiment".to_string(),
                key_drivers: vec!["Federal Reserve policy path".to_string()],
                summary: "Gold is edging higher.".to_string(),
            },
            commodity: analysis(Market::Commodity, Some(2050.30), Some(0.4458), "USD"),
            foreign_equity: analysis(Market::ForeignEquity, Some(4_958.61), Some(-0.12), "USD"),
            domestic_equity: analysis(Market::DomesticEquity, None, None, "CNY"),
            cross_market: CrossMarketComparison {
                ranking: vec![
                    RankEntry { market: Market::Commodity, change_percent: Some(0.4458) },
                    RankEntry { market: Market::ForeignEquity, change_percent: Some(-0.12) },
                    RankEntry { market: Market::DomesticEquity, change_percent: None },
                ],
                allocation: vec![AllocationTemplate {
                    profile: "balanced".to_string(),
                    mix: "50% US equities + 25% A-shares + 25% gold".to_string(),
                }],
                correlation_notes: vec!["Gold tends to move inversely to the US dollar".to_string()],
                templated: true,
            },
            key_insights: vec!["Gold: trend mild-up".to_string()],
            risk_assessment: RiskAssessment {
                overall_risk_level: RiskLevel::Moderate,
                risk_factors: vec!["Geopolitical tension".to_string()],
                mitigation_suggestions: vec!["Diversify across markets".to_string()],
            },
        }
    }

    fn gold_snapshot() -> MarketSnapshot {
        let mut sentiment = SentimentSnapshot::default();
        let mut dollar = SentimentIndicator::new(Some(104.25), "Dollar firm");
        dollar.change = Some(0.31);
        dollar.unit = Some("points".to_string());
        sentiment.insert("dollar_index", dollar);

        MarketSnapshot {
            market: Market::Commodity,
            collected_at: Utc.with_ymd_and_hms(2024, 3, 1, 21, 5, 0).unwrap(),
            sub_markets: vec![SubMarket::new(
                "futures",
                vec![QuoteEntry::Available(Quote {
                    symbol: "GC=F".to_string(),
                    name: "Gold Futures".to_string(),
                    open: 2041.2,
                    high: 2055.0,
                    low: 2038.0,
                    close: 2050.3,
                    volume: None,
                    currency: "USD".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap(),
                    previous_close: Some(2041.2),
                    change: None,
                    change_percent: None,
                    sma_5: None,
                    sma_10: None,
                    provenance: Provenance::live("Yahoo Finance"),
                })],
            )],
            sentiment,
            news: Vec::new(),
            metadata: CollectionMetadata {
                status: CollectionStatus::Success,
                sources_ok: vec!["Yahoo Finance".to_string()],
                sources_failed: Vec::new(),
                fallback_symbols: Vec::new(),
                note: None,
            },
        }
    }

    fn section<'a>(text: &'a str, heading: &str) -> &'a str {
        let start = text.find(&format!("\n## {}\n", heading)).unwrap();
        let rest = &text[start + 1..];
        match rest[3..].find("\n## ") {
            Some(end) => &rest[..end + 3],
            None => rest,
        }
    }

    #[test]
    fn test_round_trip_price_and_change() {
        let text = render(Some(&report()), &SnapshotSet::default());
        let gold = section(&text, "Gold");
        let line = gold.lines().find(|l| l.starts_with("**Current price:**")).unwrap();
        let body = line.trim_start_matches("**Current price:**").trim();
        let (price, change) = body.split_once(" (").unwrap();

        assert_relative_eq!(parse_price(price).unwrap(), 2050.30, epsilon = 0.005);
        assert_relative_eq!(parse_percent(change.trim_end_matches(')')).unwrap(), 0.45, epsilon = 0.005);
    }

    #[test]
    fn test_section_order() {
        let text = render(Some(&report()), &SnapshotSet::default());
        let headings = [
            "# Financial Market Report",
            "## Global Overview",
            "## Market Sentiment",
            "## Gold",
            "## US Stocks",
            "## China A-Shares",
            "## Cross-Market Comparison",
            "## Key Insights",
            "## Risk Assessment",
            "## Data Sources",
            "## Disclaimer",
        ];
        let positions: Vec<usize> = headings.iter().map(|h| text.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }

    #[test]
    fn test_absent_values_render_placeholders() {
        let text = render(Some(&report()), &SnapshotSet::default());
        let cn = section(&text, "China A-Shares");
        assert!(cn.contains("**Current price:** N/A (N/A)"));
        assert!(cn.contains("**Support:** N/A"));
        assert!(cn.contains("| Composite | N/A | N/A | unknown |"));
        assert!(text.contains("fixed guidance, not computed statistics"));
    }

    #[test]
    fn test_empty_inputs_render_no_data() {
        let text = render(None, &SnapshotSet::default());
        assert!(text.starts_with("# Financial Market Report"));
        assert!(section(&text, "Gold").contains(NO_DATA));
        assert!(section(&text, "Global Overview").contains(NO_DATA));
        assert!(section(&text, "Risk Assessment").contains(NO_DATA));
        assert!(text.contains("Generated: N/A"));
    }

    #[test]
    fn test_snapshot_tables() {
        let mut snapshots = SnapshotSet::default();
        snapshots.insert(gold_snapshot());
        let text = render(Some(&report()), &snapshots);

        assert!(text.contains("| Gold | dollar_index | 104.25 points | +0.31% | Dollar firm |"));
        assert!(text.contains("| GC=F | Gold Futures | $2,050.30 | +0.45% | Yahoo Finance |"));
        assert!(text.contains("Gold: collected 2024-03-01 21:05 UTC; live sources: Yahoo Finance; failed: none"));
        assert!(text.contains("Gold data: success"));
        assert!(text.contains("US Stocks data: N/A"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut snapshots = SnapshotSet::default();
        snapshots.insert(gold_snapshot());
        assert_eq!(render(Some(&report()), &snapshots), render(Some(&report()), &snapshots));
    }
}
