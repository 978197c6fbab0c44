use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use ans_etl::app::ports::HttpClientPort;
use ans_etl::config::Config;
use ans_etl::infra::http_client::ReqwestHttp;
use ans_etl::observability::{self, metrics};
use ans_etl::pipeline::{ConsolidationPipeline, ConsolidationReport, TransformPipeline, TransformReport};
use ans_etl::PipelineError;

#[derive(Parser)]
#[command(name = "ans_etl")]
#[command(about = "Quarterly claims-expense ingestion and consolidation for ANS open-data filings")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides output.dir
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Write a Prometheus exposition snapshot here when the command finishes
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the quarter archives that would be processed
    Discover {
        /// How many recent quarters to select
        #[arg(long)]
        quarters: Option<usize>,
    },
    /// Download, classify, normalize and consolidate the recent quarters
    Consolidate {
        #[arg(long)]
        quarters: Option<usize>,
    },
    /// Validate, enrich and aggregate an existing consolidated file
    Transform,
    /// Consolidate then transform
    Run {
        #[arg(long)]
        quarters: Option<usize>,
    },
}

impl Commands {
    fn quarters(&self) -> Option<usize> {
        match self {
            Commands::Discover { quarters } | Commands::Consolidate { quarters } | Commands::Run { quarters } => *quarters,
            Commands::Transform => None,
        }
    }
}

fn print_consolidation(report: &ConsolidationReport) {
    let summary = &report.summary;
    println!("\n📊 Consolidation results (run {}):", summary.run_id);
    println!("   Quarters: {}", summary.quarters.join(", "));
    println!("   Archives downloaded: {}", summary.archives_downloaded);
    println!("   Files normalized: {}", summary.files_normalized);
    println!("   Records normalized: {}", summary.records_normalized);
    println!("   Dropped (value <= 0): {}", report.stats.non_positive);
    println!("   Dropped (unresolved provider): {}", report.stats.unresolved);
    println!("   Dropped (duplicates): {}", report.stats.duplicates);
    println!("   Consolidated records: {}", summary.records_consolidated);
    println!("   Output: {}", summary.consolidated_csv);
    println!("   Archive: {}", summary.consolidated_zip);
    if !summary.errors.is_empty() {
        println!("\n⚠️  Skipped archives:");
        for e in &summary.errors {
            println!("   - {}", e);
        }
    }
}

fn print_transform(report: &TransformReport) {
    println!("\n📊 Transform results:");
    println!("   Rows read: {}", report.rows_read);
    println!("   Rows rejected by validation: {}", report.rows_rejected);
    println!("   Registry entries: {}", report.registry_entries);
    println!("   Groups: {}", report.aggregates.len());
    println!("   Output: {}", report.output.display());
}

/// Logs fatal preconditions distinctly before handing the error to anyhow.
fn report_failure(stage: &str, e: PipelineError) -> anyhow::Error {
    if e.is_fatal_precondition() {
        error!("{} aborted, precondition failed: {}", stage, e);
        println!("❌ {} aborted: {}", stage, e);
    } else {
        error!("{} failed: {}", stage, e);
        println!("❌ {} failed: {}", stage, e);
    }
    anyhow::Error::new(e).context(format!("{stage} failed"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(quarters) = cli.command.quarters() {
        config.discovery.quarters = quarters;
    }
    config.validate().context("Invalid configuration")?;

    let _log_guard = observability::init_logging(&config.logging);
    let metrics_handle = metrics::init().context("Failed to install metrics recorder")?;
    info!("Output directory: {}", config.output.dir.display());

    let http: Arc<dyn HttpClientPort> =
        Arc::new(ReqwestHttp::new(&config.source).context("Failed to build HTTP client")?);

    let outcome = match cli.command {
        Commands::Discover { .. } => {
            println!("🔎 Discovering quarter archives...");
            let pipeline = ConsolidationPipeline::new(config, http)?;
            match pipeline.discover().await {
                Ok(handles) => {
                    for handle in &handles {
                        println!("   {} -> {}", handle.period, handle.url);
                    }
                    Ok(())
                }
                Err(e) => Err(report_failure("Discovery", e)),
            }
        }
        Commands::Consolidate { .. } => {
            println!("🔄 Running consolidation...");
            let pipeline = ConsolidationPipeline::new(config, http)?;
            match pipeline.run().await {
                Ok(report) => {
                    print_consolidation(&report);
                    Ok(())
                }
                Err(e) => Err(report_failure("Consolidation", e)),
            }
        }
        Commands::Transform => {
            println!("🔨 Running transform...");
            let pipeline = TransformPipeline::new(config, http)?;
            match pipeline.run().await {
                Ok(report) => {
                    print_transform(&report);
                    Ok(())
                }
                Err(e) => Err(report_failure("Transform", e)),
            }
        }
        Commands::Run { .. } => {
            println!("🚀 Running full pipeline (consolidate + transform)...");
            println!("\n📥 Step 1: Consolidating...");
            let consolidation = ConsolidationPipeline::new(config.clone(), http.clone())?;
            match consolidation.run().await {
                Ok(report) => {
                    print_consolidation(&report);
                    println!("\n🔨 Step 2: Transforming...");
                    let transform = TransformPipeline::new(config, http)?;
                    match transform.run().await {
                        Ok(report) => {
                            print_transform(&report);
                            println!("✅ Full pipeline completed successfully!");
                            Ok(())
                        }
                        Err(e) => Err(report_failure("Transform", e)),
                    }
                }
                Err(e) => Err(report_failure("Consolidation", e)),
            }
        }
    };

    if let Some(path) = &cli.metrics_file {
        std::fs::write(path, metrics_handle.render())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!("Metrics snapshot written to {}", path.display());
    }

    outcome
}
