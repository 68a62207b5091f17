use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Market;

/// One instrument a collector asks its sources for.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSpec {
    pub symbol: String,
    pub name: String,
    pub currency: String,
    /// Anchors synthetic fallback prices near a realistic level
    pub reference_price: Option<f64>,
}

impl SymbolSpec {
    pub fn new(symbol: &str, name: &str, currency: &str, reference_price: Option<f64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            currency: currency.to_string(),
            reference_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubMarketProfile {
    pub name: String,
    pub symbols: Vec<SymbolSpec>,
}

/// Static description of what a collector fetches for its market.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketProfile {
    pub market: Market,
    pub currency: String,
    pub sub_markets: Vec<SubMarketProfile>,
    /// Symbols tried in order when picking the headline price
    pub benchmarks: Vec<String>,
}

impl MarketProfile {
    pub fn symbol_count(&self) -> usize {
        self.sub_markets.iter().map(|s| s.symbols.len()).sum()
    }

    /// Default profile for a market, with symbol lists overridable from the environment.
    pub fn for_market(market: Market) -> Self {
        let mut profile = default_profile(market);
        for sub in &mut profile.sub_markets {
            let key = format!("{}_{}_SYMBOLS", market.key(), sub.name).to_uppercase();
            if let Ok(raw) = std::env::var(&key) {
                let overridden: Vec<SymbolSpec> = raw
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|symbol| {
                        sub.symbols
                            .iter()
                            .find(|known| known.symbol == symbol)
                            .cloned()
                            .unwrap_or_else(|| SymbolSpec::new(symbol, symbol, &profile.currency, None))
                    })
                    .collect();
                if !overridden.is_empty() {
                    tracing::debug!("{} overrides {} symbols", key, sub.name);
                    sub.symbols = overridden;
                }
            }
        }
        profile
    }
}

fn default_profile(market: Market) -> MarketProfile {
    match market {
        Market::Commodity => MarketProfile {
            market,
            currency: "USD".to_string(),
            sub_markets: vec![
                SubMarketProfile {
                    name: "futures".to_string(),
                    symbols: vec![SymbolSpec::new("GC=F", "Gold Futures", "USD", Some(2050.00))],
                },
                SubMarketProfile {
                    name: "spot".to_string(),
                    symbols: vec![SymbolSpec::new("XAUUSD=X", "Spot Gold", "USD", Some(2045.50))],
                },
            ],
            benchmarks: vec!["GC=F".to_string(), "XAUUSD=X".to_string()],
        },
        Market::ForeignEquity => MarketProfile {
            market,
            currency: "USD".to_string(),
            sub_markets: vec![
                SubMarketProfile {
                    name: "indices".to_string(),
                    symbols: vec![
                        SymbolSpec::new("^DJI", "Dow Jones Industrial Average", "USD", Some(38_000.0)),
                        SymbolSpec::new("^IXIC", "NASDAQ Composite", "USD", Some(15_000.0)),
                        SymbolSpec::new("^GSPC", "S&P 500", "USD", None),
                    ],
                },
                SubMarketProfile {
                    name: "stocks".to_string(),
                    symbols: vec![
                        SymbolSpec::new("AAPL", "Apple", "USD", None),
                        SymbolSpec::new("MSFT", "Microsoft", "USD", None),
                        SymbolSpec::new("GOOGL", "Alphabet", "USD", None),
                        SymbolSpec::new("AMZN", "Amazon", "USD", None),
                        SymbolSpec::new("META", "Meta Platforms", "USD", None),
                        SymbolSpec::new("NVDA", "NVIDIA", "USD", None),
                        SymbolSpec::new("TSLA", "Tesla", "USD", None),
                    ],
                },
            ],
            benchmarks: vec!["^GSPC".to_string()],
        },
        Market::DomesticEquity => MarketProfile {
            market,
            currency: "CNY".to_string(),
            sub_markets: vec![
                SubMarketProfile {
                    name: "indices".to_string(),
                    symbols: vec![
                        SymbolSpec::new("000001.SS", "Shanghai Composite", "CNY", Some(2877.30)),
                        SymbolSpec::new("399001.SZ", "Shenzhen Component", "CNY", Some(8863.82)),
                        SymbolSpec::new("399006.SZ", "ChiNext", "CNY", Some(1623.56)),
                        SymbolSpec::new("000300.SS", "CSI 300", "CNY", Some(3525.85)),
                        SymbolSpec::new("000016.SS", "SSE 50", "CNY", Some(2431.12)),
                    ],
                },
                SubMarketProfile {
                    name: "stocks".to_string(),
                    symbols: vec![
                        SymbolSpec::new("600519.SS", "Kweichow Moutai", "CNY", None),
                        SymbolSpec::new("601398.SS", "ICBC", "CNY", None),
                        SymbolSpec::new("601857.SS", "PetroChina", "CNY", None),
                        SymbolSpec::new("600036.SS", "China Merchants Bank", "CNY", None),
                        SymbolSpec::new("601988.SS", "Bank of China", "CNY", None),
                        SymbolSpec::new("600030.SS", "CITIC Securities", "CNY", None),
                        SymbolSpec::new("601888.SS", "China Tourism Group Duty Free", "CNY", None),
                        SymbolSpec::new("300750.SZ", "CATL", "CNY", None),
                    ],
                },
            ],
            benchmarks: vec!["000001.SS".to_string()],
        },
    }
}

/// Exponential back-off: `base_delay * 2^attempt`, at most `max_attempts` tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Fixed pause between request starts on one client
    pub request_delay_ms: u64,
    /// Sliding one-minute request ceiling per client
    pub rate_limit_per_minute: usize,
    /// Concurrent sub-fetches inside one collector
    pub max_concurrent_fetches: usize,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            request_delay_ms: 500,
            rate_limit_per_minute: 100,
            max_concurrent_fetches: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceEndpoints {
    pub yahoo_base_url: String,
    pub eastmoney_base_url: String,
    pub finnhub_base_url: String,
    pub finnhub_api_key: Option<String>,
    pub fear_greed_url: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            yahoo_base_url: "https://query1.finance.yahoo.com/v8/finance".to_string(),
            eastmoney_base_url: "https://push2.eastmoney.com/api".to_string(),
            finnhub_base_url: "https://finnhub.io/api/v1".to_string(),
            finnhub_api_key: None,
            fear_greed_url: "https://production.dataviz.cnn.io/index/fearandgreed/graphdata".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishConfig {
    pub git_enabled: bool,
    pub repo_root: PathBuf,
    pub branch: String,
    pub push_after_commit: bool,
    /// `{date}` is replaced with `%Y-%m-%d %H:%M`
    pub commit_message_template: String,
    pub webhook_url: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            git_enabled: true,
            repo_root: PathBuf::from("."),
            branch: "main".to_string(),
            push_after_commit: true,
            commit_message_template: "Financial report update - {date}".to_string(),
            webhook_url: None,
        }
    }
}

/// Process-wide configuration, built once at start-up and passed down explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub report_prefix: String,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
    /// When false, failed symbols are recorded as missing instead of synthesized
    pub synthetic_fallback: bool,
    pub run_timeout_secs: Option<u64>,
    pub sources: SourceEndpoints,
    pub markets: Vec<MarketProfile>,
    pub publish: PublishConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_root("financial_report")
    }
}

impl PipelineConfig {
    /// Defaults with every artifact directory under `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            data_dir: root.join("data"),
            analysis_dir: root.join("analysis"),
            reports_dir: root.join("reports"),
            report_prefix: "financial_report".to_string(),
            http: HttpConfig::default(),
            retry: RetryPolicy::default(),
            synthetic_fallback: true,
            run_timeout_secs: None,
            sources: SourceEndpoints::default(),
            markets: Market::ALL.into_iter().map(default_profile).collect(),
            publish: PublishConfig::default(),
        }
    }

    /// Load from `.env` and environment variables. Unset values keep their defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let root = std::env::var("REPORT_ROOT_DIR").unwrap_or_else(|_| "financial_report".to_string());
        let mut config = Self::with_root(&root);

        if let Ok(dir) = std::env::var("REPORT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("REPORT_ANALYSIS_DIR") {
            config.analysis_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("REPORT_OUTPUT_DIR") {
            config.reports_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("REPORT_PREFIX") {
            config.report_prefix = prefix;
        }

        config.http.timeout_secs = env_parse("HTTP_TIMEOUT_SECS", config.http.timeout_secs);
        config.http.request_delay_ms = env_parse("REQUEST_DELAY_MS", config.http.request_delay_ms);
        config.http.rate_limit_per_minute = env_parse("RATE_LIMIT_PER_MINUTE", config.http.rate_limit_per_minute);
        config.http.max_concurrent_fetches = env_parse("MAX_CONCURRENT_FETCHES", config.http.max_concurrent_fetches).max(1);

        config.retry.max_attempts = env_parse("RETRY_MAX_ATTEMPTS", config.retry.max_attempts).max(1);
        config.retry.base_delay_ms = env_parse("RETRY_BASE_DELAY_MS", config.retry.base_delay_ms);

        config.synthetic_fallback = env_bool("SYNTHETIC_FALLBACK", config.synthetic_fallback);
        config.run_timeout_secs = std::env::var("PIPELINE_RUN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok());

        if let Ok(url) = std::env::var("YAHOO_BASE_URL") {
            config.sources.yahoo_base_url = url;
        }
        if let Ok(url) = std::env::var("EASTMONEY_BASE_URL") {
            config.sources.eastmoney_base_url = url;
        }
        if let Ok(url) = std::env::var("FINNHUB_BASE_URL") {
            config.sources.finnhub_base_url = url;
        }
        if let Ok(url) = std::env::var("FEAR_GREED_URL") {
            config.sources.fear_greed_url = url;
        }
        config.sources.finnhub_api_key = std::env::var("FINNHUB_API_KEY").ok().filter(|s| !s.is_empty());

        config.markets = Market::ALL.into_iter().map(MarketProfile::for_market).collect();

        config.publish.git_enabled = env_bool("GIT_COMMIT_ENABLED", config.publish.git_enabled);
        config.publish.push_after_commit = env_bool("GIT_PUSH_AFTER_COMMIT", config.publish.push_after_commit);
        if let Ok(branch) = std::env::var("GIT_BRANCH") {
            config.publish.branch = branch;
        }
        if let Ok(root) = std::env::var("GIT_REPO_ROOT") {
            config.publish.repo_root = PathBuf::from(root);
        }
        if let Ok(template) = std::env::var("GIT_COMMIT_MESSAGE_TEMPLATE") {
            config.publish.commit_message_template = template;
        }
        config.publish.webhook_url = std::env::var("REPORT_WEBHOOK_URL").ok().filter(|s| !s.is_empty());

        config
    }

    pub fn market(&self, market: Market) -> Option<&MarketProfile> {
        self.markets.iter().find(|p| p.market == market)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
