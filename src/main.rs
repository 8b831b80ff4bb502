//! adspend-optimizer - scheduled advertising spend decisions
//!
//! # Usage
//!
//! ```bash
//! # One optimization run over a metrics snapshot
//! adspend-optimizer run --metrics metrics.jsonl
//!
//! # Same, without touching the ad platform or the ledger
//! adspend-optimizer run --metrics metrics.jsonl --dry-run
//!
//! # With a learned bid model
//! adspend-optimizer run --metrics metrics.jsonl --bid-model bid_model.json
//!
//! # Check configuration
//! adspend-optimizer validate-config --config optimizer.toml
//!
//! # Inspect a ledger partition
//! adspend-optimizer ledger --date 2026-10-18
//! ```
//!
//! # Environment Variables
//!
//! - `ADSPEND_CONFIG`: path to the TOML config (default: `./optimizer.toml`)
//! - `ADSPEND_ACCESS_TOKEN`: ad platform bearer token (required unless `--dry-run`)
//! - `MIN_CTR_THRESHOLD`, `MAX_CPC`, ...: threshold overrides
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use adspend_optimizer::config::defaults;
use adspend_optimizer::{
    open_ledger, ActionLedger, AdPlatform, DryRunPlatform, HttpAdPlatform, InMemoryLedger,
    JsonFileSink, JsonFileSource, LinearBidPredictor, OptimizationPipeline, OptimizerConfig,
    TracingSink,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "adspend-optimizer")]
#[command(about = "Optimization decision engine for advertising spend")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config (overrides ADSPEND_CONFIG and ./optimizer.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Execute one optimization run and print the finalized run as JSON
    Run {
        /// Metrics snapshot (JSON array or JSON Lines)
        #[arg(long, value_name = "FILE")]
        metrics: PathBuf,

        /// Linear bid model artifact
        #[arg(long, value_name = "FILE")]
        bid_model: Option<PathBuf>,

        /// Log platform operations instead of sending them; nothing is written to the ledger
        #[arg(long)]
        dry_run: bool,
    },

    /// Load and validate configuration, then print the effective TOML
    ValidateConfig,

    /// Print one ledger partition as JSON Lines
    Ledger {
        /// Partition date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        SubCommand::Run { metrics, bid_model, dry_run } => run(config, metrics, bid_model, dry_run).await,
        SubCommand::ValidateConfig => {
            info!("Configuration is valid");
            println!("{}", config.to_toml()?);
            Ok(())
        }
        SubCommand::Ledger { date } => {
            let ledger = open_ledger(&config.ledger).context("Failed to open action ledger")?;
            for entry in ledger.read_partition(date)? {
                println!("{}", serde_json::to_string(&entry)?);
            }
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<OptimizerConfig> {
    let config = match path {
        Some(p) => OptimizerConfig::load_with(Some(p), |key| std::env::var(key).ok()),
        None => OptimizerConfig::load(),
    };
    config.context("Invalid optimizer configuration")
}

async fn run(
    mut config: OptimizerConfig,
    metrics: PathBuf,
    bid_model: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    config.run.dry_run |= dry_run;

    let (platform, ledger): (Arc<dyn AdPlatform>, Arc<dyn ActionLedger>) = if config.run.dry_run {
        info!("Dry run: platform calls are logged only, ledger is in-memory");
        (Arc::new(DryRunPlatform), Arc::new(InMemoryLedger::new()))
    } else {
        let token = std::env::var(defaults::ACCESS_TOKEN_ENV_VAR)
            .with_context(|| format!("{} is not set", defaults::ACCESS_TOKEN_ENV_VAR))?;
        let platform = HttpAdPlatform::new(&config.platform, &token)
            .context("Failed to build ad platform client")?;
        let ledger = open_ledger(&config.ledger).context("Failed to open action ledger")?;
        (Arc::new(platform), ledger)
    };

    let summary_dir = config.report.summary_dir.clone();
    let mut pipeline = OptimizationPipeline::new(
        config,
        Arc::new(JsonFileSource::new(metrics)),
        platform,
        ledger,
    )?
    .with_sink(Arc::new(TracingSink));

    if let Some(dir) = summary_dir {
        pipeline = pipeline.with_sink(Arc::new(JsonFileSink::new(dir)));
    }
    if let Some(path) = bid_model {
        let model = LinearBidPredictor::load(&path)
            .with_context(|| format!("Failed to load bid model {}", path.display()))?;
        pipeline = pipeline.with_predictor(Arc::new(model));
    }

    let report = pipeline.run_once(Utc::now()).await;
    for w in &report.sink_warnings {
        warn!("{}", w);
    }
    println!("{}", serde_json::to_string_pretty(&report.run)?);
    Ok(())
}
