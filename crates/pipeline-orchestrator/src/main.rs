use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use market_core::PipelineConfig;
use pipeline_orchestrator::{Pipeline, RunMode, RunOptions, RunRecord};

#[derive(Parser)]
#[command(name = "market-report")]
#[command(about = "Collects gold, US and China market data and renders a daily report", long_about = None)]
#[command(version)]
struct Cli {
    /// auto: full run with publishing; manual: no publishing; report: re-render latest data
    #[arg(long, value_enum, default_value_t = RunMode::Auto)]
    mode: RunMode,

    /// Stop after collecting market data
    #[arg(long)]
    collect_only: bool,

    /// Skip the publishing step
    #[arg(long)]
    no_commit: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let default_filter = format!(
        "market_report={level},pipeline_orchestrator={level},market_collector={level},report_publisher={level},quote_client=warn"
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_summary(record: &RunRecord) {
    println!("==============================");
    println!("Run summary");
    println!("  success:     {}", record.success);
    println!("  mode:        {}", record.mode);
    println!("  state:       {}", record.state_label());
    println!(
        "  report:      {}",
        record
            .report_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "N/A".to_string())
    );
    for (market, status) in &record.collection_status {
        println!("  {:<12} {}", format!("{}:", market), status.label());
    }
    println!("  errors:      {}", record.error_count());
    for error in &record.errors {
        println!("    - {}", error);
    }
    for error in &record.publish_errors {
        println!("    - publish: {}", error);
    }
    if let Some(failure) = &record.failure {
        println!("    - {}", failure);
    }
    if let Some(finished) = record.finished_at {
        println!("  duration:    {}s", (finished - record.started_at).num_seconds());
    }
    println!("==============================");
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    // .env may carry RUST_LOG, and config loading logs its overrides
    dotenvy::dotenv().ok();
    init_tracing(&cli.log_level);
    let config = Arc::new(PipelineConfig::from_env());

    tracing::info!("Starting market report pipeline");
    tracing::info!("  Data dir: {}", config.data_dir.display());
    tracing::info!("  Reports dir: {}", config.reports_dir.display());
    tracing::info!(
        "  Retry: {} attempts, base delay {}ms",
        config.retry.max_attempts,
        config.retry.base_delay_ms
    );

    let options = RunOptions {
        mode: cli.mode,
        collect_only: cli.collect_only,
        no_commit: cli.no_commit,
    };

    let pipeline = Pipeline::from_config(config);
    let record = pipeline.run(&options).await;
    print_summary(&record);

    Ok(if record.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
