//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the catalog harvesting pipeline.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, validate_category_url, Config, MAX_WORKERS};
use catalog_harvest::output::{load_products, print_run_stats};
use catalog_harvest::storage::{open_storage, RunLedger};
use catalog_harvest::{Pipeline, RunOutcome};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a concurrent catalog extraction and enrichment pipeline
///
/// Catalog-Harvest walks category pages down to individual products,
/// downloads and normalizes their images, optionally translates names and
/// turns specification images into tables, and writes a full export plus
/// one export per category.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent catalog extraction and enrichment pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Worker count per stage (overrides the configuration, 1-10)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=MAX_WORKERS as i64))]
    workers: Option<u8>,

    /// Category URL to harvest instead of the configured ones (repeatable)
    #[arg(long = "category", value_name = "URL")]
    categories: Vec<String>,

    /// Only process the series at this position in the series list (repeatable)
    #[arg(long = "series", value_name = "INDEX")]
    series: Vec<usize>,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["history", "reprocess"])]
    dry_run: bool,

    /// Show recent runs from the ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "reprocess"])]
    history: bool,

    /// Re-run enrichment over a previous JSON export and write fresh exports
    #[arg(long, value_name = "PRODUCTS_JSON", conflicts_with_all = ["dry_run", "history"])]
    reprocess: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(workers) = cli.workers {
        config.scraper.workers = usize::from(workers);
    }

    let categories = if cli.categories.is_empty() {
        config.categories.clone()
    } else {
        for url in &cli.categories {
            validate_category_url(url)?;
        }
        cli.categories.clone()
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &categories, &cli.series);
    } else if cli.history {
        handle_history(&config)?;
    } else if let Some(path) = &cli.reprocess {
        handle_reprocess(config, config_hash, path).await?;
    } else {
        handle_harvest(config, config_hash, &categories, &cli.series).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config, categories: &[String], series: &[usize]) {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Pipeline Configuration:");
    println!("  Workers: {}", config.scraper.workers);
    println!(
        "  Enrichment workers: {}",
        config.scraper.effective_enrichment_workers()
    );
    println!("  Request timeout: {}s", config.scraper.request_timeout_secs);
    println!("  Render timeout: {}s", config.scraper.render_timeout_secs);
    println!(
        "  Attempts per fetch: {} (backoff base {}ms)",
        config.scraper.max_attempts, config.scraper.backoff_base_ms
    );
    println!("  Renderer: {:?}", config.scraper.renderer);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  File prefix: {}", config.output.file_prefix);
    println!("  Ledger: {}", config.output.ledger_path);
    println!("  Partition marker: {}", config.partition.path_marker);

    println!("\nEnrichment:");
    if config.enrichment.enabled {
        let key_present = std::env::var(&config.enrichment.api_key_env)
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        println!("  Model: {}", config.enrichment.model);
        println!("  Target language: {}", config.enrichment.target_language);
        println!(
            "  API key ({}): {}",
            config.enrichment.api_key_env,
            if key_present { "present" } else { "missing, stage will be skipped" }
        );
    } else {
        println!("  Disabled");
    }

    println!("\nCategories ({}):", categories.len());
    for url in categories {
        println!("  - {}", url);
    }

    if !series.is_empty() {
        println!("\nSeries selection: {:?}", series);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} categories", categories.len());
}

/// Handles the --history mode: shows recent runs from the ledger
fn handle_history(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Ledger: {}\n", config.output.ledger_path);

    let storage = open_storage(Path::new(&config.output.ledger_path))?;
    let runs = storage.recent_runs(10)?;

    if runs.is_empty() {
        println!("No runs recorded yet");
        return Ok(());
    }

    println!("=== Recent Runs ===\n");
    for run in runs {
        println!(
            "#{} {} [{}] started {}",
            run.id,
            run.mode.to_db_string(),
            run.status.to_db_string(),
            run.started_at
        );
        println!(
            "    series {}, products {}, saved {}, errors {}, {:.1}s",
            run.series_count,
            run.products_count,
            run.success_count,
            run.error_count,
            run.duration_seconds.unwrap_or(0.0)
        );
        if let Some(error) = &run.error_message {
            println!("    error: {}", error);
        }

        let failures = storage.failures_for_run(run.id)?;
        if !failures.is_empty() {
            println!("    {} item failures, first few:", failures.len());
            for failure in failures.iter().take(5) {
                println!(
                    "      [{}] {}: {}",
                    failure.phase, failure.subject, failure.message
                );
            }
        }
    }

    Ok(())
}

/// Builds the pipeline with the ledger attached and Ctrl-C wired to cancellation
async fn build_pipeline(
    config: Config,
    config_hash: String,
) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let ledger = open_storage(Path::new(&config.output.ledger_path))?;
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(config)
        .await?
        .with_ledger(ledger, config_hash)
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            cancel.cancel();
        }
    });

    let mut status = pipeline.status();
    tokio::spawn(async move {
        while let Some(update) = status.changed().await {
            tracing::info!("[{:>3}%] {}", update.progress_percent, update.stage_label);
        }
    });

    Ok(pipeline)
}

fn report(outcome: &RunOutcome) {
    print_run_stats(&outcome.stats);

    if let Some(artifacts) = &outcome.artifacts {
        println!("\nExports:");
        println!("  {}", artifacts.full_json.display());
        println!("  {}", artifacts.full_spreadsheet.display());
        for (key, path) in &artifacts.partitions {
            println!("  [{}] {}", key, path.display());
        }
    }

    if outcome.cancelled {
        println!("\nRun was interrupted; exports hold the products finished before the interrupt.");
    }
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    categories: &[String],
    series: &[usize],
) -> Result<(), Box<dyn std::error::Error>> {
    if categories.is_empty() {
        return Err("No category URLs configured or given with --category".into());
    }

    tracing::info!(
        "Categories: {}, workers: {}",
        categories.len(),
        config.scraper.workers
    );

    let pipeline = build_pipeline(config, config_hash).await?;
    let filter = (!series.is_empty()).then_some(series);

    match pipeline.run(categories, filter).await {
        Ok(outcome) => {
            tracing::info!("Harvest completed");
            report(&outcome);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the --reprocess mode
async fn handle_reprocess(
    config: Config,
    config_hash: String,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let products = load_products(path)
        .with_context(|| format!("Failed to load previous export {}", path.display()))?;
    tracing::info!("Loaded {} products from {}", products.len(), path.display());

    let pipeline = build_pipeline(config, config_hash).await?;
    let outcome = pipeline
        .reprocess(products)
        .await
        .context("Reprocess run failed")?;

    report(&outcome);
    Ok(())
}
