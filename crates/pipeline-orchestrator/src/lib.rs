//! Run sequencing: collect, analyze, render, publish.

pub mod fallback;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use market_analyzer::MarketAnalyzer;
use market_collector::{load_latest, CollectorError, MarketCollector, SnapshotCollector};
use market_core::artifact::{file_timestamp, read_json_opt, write_json_versioned, write_text_versioned};
use market_core::{CollectionStatus, ComprehensiveReport, Market, MarketSnapshot, PipelineConfig, SnapshotSet};
use report_publisher::{commit_message, PublisherSet};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const LATEST_ANALYSIS: &str = "latest_analysis.json";
pub const LATEST_REPORT: &str = "latest_report.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Collect, analyze, render and publish
    Auto,
    /// Same as auto without publishing
    Manual,
    /// Re-render from the latest persisted data only
    Report,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::Auto => "auto",
            RunMode::Manual => "manual",
            RunMode::Report => "report",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    pub collect_only: bool,
    pub no_commit: bool,
}

impl RunOptions {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            collect_only: false,
            no_commit: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Collecting,
    Analyzing,
    Rendering,
    Publishing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::Collecting => "collecting",
            Stage::Analyzing => "analyzing",
            Stage::Rendering => "rendering",
            Stage::Publishing => "publishing",
            Stage::Done => "done",
        })
    }
}

/// An error that ended the run at `stage`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} failed: {message}")]
pub struct PipelineFailure {
    pub stage: Stage,
    pub message: String,
}

impl PipelineFailure {
    fn new(stage: Stage, message: impl fmt::Display) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

/// Outcome of one run. `success` only reflects pipeline failures; publish errors are recorded separately.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub success: bool,
    pub mode: RunMode,
    /// Last stage entered; with `failure` set this is the failed stage
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub report_path: Option<PathBuf>,
    pub analysis_path: Option<PathBuf>,
    pub collection_status: BTreeMap<Market, CollectionStatus>,
    /// Recovered problems such as a collector replaced by static data
    pub errors: Vec<String>,
    pub publish_errors: Vec<String>,
    pub failure: Option<PipelineFailure>,
}

impl RunRecord {
    fn start(mode: RunMode) -> Self {
        Self {
            success: false,
            mode,
            stage: Stage::Idle,
            started_at: Utc::now(),
            finished_at: None,
            report_path: None,
            analysis_path: None,
            collection_status: BTreeMap::new(),
            errors: Vec::new(),
            publish_errors: Vec::new(),
            failure: None,
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!("Stage: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// `done`, or `failed(<stage>)`.
    pub fn state_label(&self) -> String {
        match &self.failure {
            Some(f) => format!("failed({})", f.stage),
            None => self.stage.to_string(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len() + self.publish_errors.len() + usize::from(self.failure.is_some())
    }
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    analyzer: MarketAnalyzer,
    collectors: Vec<Arc<dyn SnapshotCollector>>,
    publishers: PublisherSet,
}

impl Pipeline {
    /// A pipeline with no collectors or publishers.
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self {
            analyzer: MarketAnalyzer::new(&config),
            config,
            collectors: Vec::new(),
            publishers: PublisherSet::default(),
        }
    }

    /// Live collectors for every market plus the configured publishers.
    pub fn from_config(config: Arc<PipelineConfig>) -> Self {
        let mut pipeline = Self::new(Arc::clone(&config)).with_publishers(PublisherSet::from_config(&config.publish));
        for market in Market::ALL {
            pipeline = pipeline.with_collector(Arc::new(MarketCollector::from_config(&config, market)));
        }
        pipeline
    }

    pub fn with_collector(mut self, collector: Arc<dyn SnapshotCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_publishers(mut self, publishers: PublisherSet) -> Self {
        self.publishers = publishers;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run once, cancelling in-flight fetches when the configured run timeout elapses.
    pub async fn run(&self, options: &RunOptions) -> RunRecord {
        let cancel = CancellationToken::new();
        let timer = self.config.run_timeout().map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!("Run timeout of {:?} elapsed, cancelling", timeout);
                cancel.cancel();
            })
        });

        let record = self.run_with_cancel(options, &cancel).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        record
    }

    pub async fn run_with_cancel(&self, options: &RunOptions, cancel: &CancellationToken) -> RunRecord {
        let mut record = RunRecord::start(options.mode);
        info!("Pipeline run started (mode={})", options.mode);

        let result = match options.mode {
            RunMode::Report => self.run_report(&mut record).await,
            RunMode::Auto | RunMode::Manual => self.run_full(options, &mut record, cancel).await,
        };

        match result {
            Ok(()) => {
                record.enter(Stage::Done);
                record.success = true;
            }
            Err(failure) => {
                error!("Pipeline failed: {}", failure);
                record.failure = Some(failure);
            }
        }
        record.finished_at = Some(Utc::now());
        record
    }

    async fn run_full(
        &self,
        options: &RunOptions,
        record: &mut RunRecord,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineFailure> {
        record.enter(Stage::Collecting);
        let snapshots = self.collect(record, cancel).await?;
        if options.collect_only {
            info!("Collect-only run, skipping analysis");
            return Ok(());
        }

        record.enter(Stage::Analyzing);
        let [gold, us, cn] = &snapshots;
        let report = self.analyzer.generate_comprehensive_analysis(gold, us, cn);
        let ts = file_timestamp(report.generated_at);
        let analysis_path = write_json_versioned(
            &self.config.analysis_dir,
            &format!("analysis_result_{}.json", ts),
            LATEST_ANALYSIS,
            &report,
        )
        .await
        .map_err(|e| PipelineFailure::new(Stage::Analyzing, e))?;
        record.analysis_path = Some(analysis_path);

        record.enter(Stage::Rendering);
        let mut set = SnapshotSet::default();
        for snapshot in snapshots {
            set.insert(snapshot);
        }
        let report_path = self.render_to_disk(Some(&report), &set, Utc::now()).await?;
        record.report_path = Some(report_path.clone());

        if options.mode == RunMode::Auto && !options.no_commit {
            record.enter(Stage::Publishing);
            let message = commit_message(&self.config.publish.commit_message_template, Utc::now());
            record.publish_errors = self.publishers.publish_all(&report_path, &message).await;
        }
        Ok(())
    }

    async fn run_report(&self, record: &mut RunRecord) -> Result<(), PipelineFailure> {
        record.enter(Stage::Rendering);

        let mut set = SnapshotSet::default();
        for market in Market::ALL {
            match load_latest(&self.config.data_dir, market).await {
                Ok(Some(snapshot)) => {
                    record.collection_status.insert(market, snapshot.metadata.status);
                    set.insert(snapshot);
                }
                Ok(None) => warn!("No persisted snapshot for {}", market),
                Err(e) => {
                    warn!("Ignoring unreadable snapshot for {}: {}", market, e);
                    record.errors.push(format!("{}: {}", market, e));
                }
            }
        }

        let analysis_path = self.config.analysis_dir.join(LATEST_ANALYSIS);
        let report: Option<ComprehensiveReport> = match read_json_opt(&analysis_path).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Ignoring unreadable analysis {}: {}", analysis_path.display(), e);
                record.errors.push(format!("analysis: {}", e));
                None
            }
        };
        if report.is_none() {
            warn!("No persisted analysis, rendering placeholders");
        }

        let report_path = self.render_to_disk(report.as_ref(), &set, Utc::now()).await?;
        record.report_path = Some(report_path);
        Ok(())
    }

    /// All three snapshots in market order. A collector error other than cancellation
    /// is replaced by the static fallback snapshot for its market.
    async fn collect(
        &self,
        record: &mut RunRecord,
        cancel: &CancellationToken,
    ) -> Result<[MarketSnapshot; 3], PipelineFailure> {
        let results = join_all(self.collectors.iter().map(|collector| {
            let collector = Arc::clone(collector);
            async move { (collector.market(), collector.collect_all(cancel).await) }
        }))
        .await;

        let mut collected: BTreeMap<Market, MarketSnapshot> = BTreeMap::new();
        for (market, result) in results {
            match result {
                Ok(snapshot) => {
                    collected.insert(market, snapshot);
                }
                Err(CollectorError::Cancelled) => {
                    return Err(PipelineFailure::new(Stage::Collecting, CollectorError::Cancelled));
                }
                Err(e) => {
                    warn!("Collector for {} failed, using static fallback: {}", market, e);
                    record.errors.push(format!("{}: {}", market, e));
                    collected.insert(market, fallback::static_snapshot(market, Utc::now(), &e.to_string()));
                }
            }
        }

        let mut take = |market: Market| {
            collected.remove(&market).unwrap_or_else(|| {
                warn!("No collector configured for {}, using static fallback", market);
                fallback::static_snapshot(market, Utc::now(), "no collector configured")
            })
        };
        let snapshots = [
            take(Market::Commodity),
            take(Market::ForeignEquity),
            take(Market::DomesticEquity),
        ];

        for snapshot in &snapshots {
            record.collection_status.insert(snapshot.market, snapshot.metadata.status);
        }
        Ok(snapshots)
    }

    async fn render_to_disk(
        &self,
        report: Option<&ComprehensiveReport>,
        snapshots: &SnapshotSet,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, PipelineFailure> {
        let text = report_renderer::render(report, snapshots);
        let name = format!("{}_{}.md", self.config.report_prefix, file_timestamp(at));
        let path = write_text_versioned(&self.config.reports_dir, &name, LATEST_REPORT, &text)
            .await
            .map_err(|e| PipelineFailure::new(Stage::Rendering, e))?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}
