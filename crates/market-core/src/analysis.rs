use crate::types::Market;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction label derived from a change-percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
    StrongUp,
    MildUp,
    Flat,
    MildDown,
    StrongDown,
    /// No change-percent was available
    Unknown,
}

impl Trend {
    /// Strict thresholds: exactly 1.0 is mild-up, exactly 0.2 is flat, and symmetrically below zero.
    pub fn classify(change_percent: Option<f64>) -> Self {
        match change_percent {
            None => Trend::Unknown,
            Some(c) if !c.is_finite() => Trend::Unknown,
            Some(c) if c > 1.0 => Trend::StrongUp,
            Some(c) if c > 0.2 => Trend::MildUp,
            Some(c) if c < -1.0 => Trend::StrongDown,
            Some(c) if c < -0.2 => Trend::MildDown,
            Some(_) => Trend::Flat,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Trend::StrongUp => "strong-up",
            Trend::MildUp => "mild-up",
            Trend::Flat => "flat",
            Trend::MildDown => "mild-down",
            Trend::StrongDown => "strong-down",
            Trend::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    Positive,
    Neutral,
    Negative,
    Unknown,
}

impl FactorStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FactorStatus::Positive => "positive",
            FactorStatus::Neutral => "neutral",
            FactorStatus::Negative => "negative",
            FactorStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalFactor {
    pub key: String,
    pub name: String,
    pub status: FactorStatus,
    pub description: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicator {
    pub name: String,
    pub value: Option<f64>,
    pub reading: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Positive,
    Neutral,
    Negative,
}

impl Mood {
    pub fn label(&self) -> &'static str {
        match self {
            Mood::Positive => "positive",
            Mood::Neutral => "neutral",
            Mood::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
}

impl Confidence {
    pub fn label(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
        }
    }
}

/// Majority vote over tagged news items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub mood: Mood,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub confidence: Confidence,
    pub key_themes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Moderate,
    ModerateHigh,
    High,
    Unknown,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::ModerateHigh => "moderate-high",
            RiskLevel::High => "high",
            RiskLevel::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub reason: String,
    pub risk_level: RiskLevel,
}

/// One index line of an equity market's table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub symbol: String,
    pub name: String,
    pub close: Option<f64>,
    pub change_percent: Option<f64>,
    pub trend: Trend,
    /// False when the row is backed by synthetic or static data
    pub live: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadth {
    pub advance: usize,
    pub decline: usize,
}

impl Breadth {
    pub fn label(&self) -> Option<String> {
        if self.advance + self.decline == 0 {
            None
        } else {
            Some(format!("{}:{}", self.advance, self.decline))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    pub name: String,
    pub change_percent: f64,
}

/// Equity-only overview: aggregate status, breadth and top movers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub status: String,
    pub average_change_percent: Option<f64>,
    pub breadth: Breadth,
    pub leaders: Vec<Mover>,
    pub laggards: Vec<Mover>,
}

/// Read-only interpretation of one market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub market: Market,
    /// Collection time of the analyzed snapshot
    pub as_of: DateTime<Utc>,
    pub benchmark: Option<String>,
    pub currency: String,
    pub current_price: Option<f64>,
    pub change_percent: Option<f64>,
    pub trend: Trend,
    /// Descending
    pub support_levels: Vec<f64>,
    /// Ascending
    pub resistance_levels: Vec<f64>,
    pub fundamental_factors: Vec<FundamentalFactor>,
    pub technical_indicators: Vec<TechnicalIndicator>,
    pub sentiment: SentimentSummary,
    #[serde(default)]
    pub overview: Option<MarketOverview>,
    #[serde(default)]
    pub index_table: Vec<IndexRow>,
    pub outlook: String,
    pub recommendation: Recommendation,
    /// False if any figure behind the analysis was synthetic or missing
    pub live_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalOverview {
    pub overall_status: String,
    pub key_drivers: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub market: Market,
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTemplate {
    pub profile: String,
    pub mix: String,
}

/// Cross-market section. Allocation and correlation content is templated text,
/// not computed statistics; `templated` is always true and is rendered as such.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossMarketComparison {
    pub ranking: Vec<RankEntry>,
    pub allocation: Vec<AllocationTemplate>,
    pub correlation_notes: Vec<String>,
    pub templated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub mitigation_suggestions: Vec<String>,
}

/// The renderer's sole structured input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub generated_at: DateTime<Utc>,
    pub global_overview: GlobalOverview,
    pub commodity: MarketAnalysis,
    pub foreign_equity: MarketAnalysis,
    pub domestic_equity: MarketAnalysis,
    pub cross_market: CrossMarketComparison,
    pub key_insights: Vec<String>,
    pub risk_assessment: RiskAssessment,
}

impl ComprehensiveReport {
    pub fn market(&self, market: Market) -> &MarketAnalysis {
        match market {
            Market::Commodity => &self.commodity,
            Market::ForeignEquity => &self.foreign_equity,
            Market::DomesticEquity => &self.domestic_equity,
        }
    }
}
