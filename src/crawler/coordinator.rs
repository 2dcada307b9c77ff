//! Pipeline coordinator - main harvest orchestration logic
//!
//! This module drives a run through its stages in order:
//! - Series extraction, fanned out per category
//! - Product listing extraction, fanned out per series
//! - Detail extraction, image acquisition and enrichment, fanned out per product
//! - Persistence of the surviving products
//!
//! Each stage owns the batch it processes and hands a new batch to the next.
//! Products carry their listing position through every stage so exports keep
//! listing order regardless of completion order. Workers report back through
//! their task results only; the coordinator alone updates the run status, the
//! statistics and the ledger.

use crate::config::{Config, MAX_WORKERS};
use crate::crawler::{
    build_renderer, default_strategies, extract_detail, extract_products, extract_series, fan_out,
    FanIn, Fetcher, ListingStrategy, PageRenderer,
};
use crate::enrich::{Enricher, EnrichmentStage, GeminiClient};
use crate::images::ImagePipeline;
use crate::model::{EnrichedProduct, ItemFailure, ProductDetail, ProductImages, ProductStub, Series};
use crate::output::{self, partition_by_category, ExportArtifacts, RunStats};
use crate::state::{RunPhase, StatusHandle, StatusReporter};
use crate::storage::{LedgerStatus, RunLedger, RunMode, SqliteStorage};
use crate::{HarvestError, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Subdirectory of the output directory receiving downloaded images
pub const IMAGES_DIR: &str = "images";

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final run statistics
    pub stats: RunStats,

    /// Per-item failures, in the order they were collected
    pub failures: Vec<ItemFailure>,

    /// Written exports; `None` when nothing reached persistence
    pub artifacts: Option<ExportArtifacts>,

    /// True if the run stopped early on cancellation
    pub cancelled: bool,

    /// Ledger row of the run, when a ledger is attached
    pub run_id: Option<i64>,
}

/// Main pipeline structure
pub struct Pipeline {
    config: Arc<Config>,
    config_hash: String,
    fetcher: Fetcher,
    renderer: Arc<dyn PageRenderer>,
    strategies: Arc<Vec<Box<dyn ListingStrategy>>>,
    enrichment: EnrichmentStage,
    ledger: Option<Arc<Mutex<SqliteStorage>>>,
    status: StatusReporter,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Creates a new pipeline
    ///
    /// The enrichment capability is configured from the environment; when
    /// it is unavailable the run proceeds without enrichment.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client or renderer could not be built
    pub async fn new(config: Config) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config.http, &config.scraper)?;
        let renderer = build_renderer(&config, &fetcher).await?;

        let enricher: Option<Arc<dyn Enricher>> =
            match GeminiClient::from_env(fetcher.client().clone(), &config.enrichment) {
                Ok(client) => {
                    tracing::info!("Enrichment enabled with model {}", config.enrichment.model);
                    Some(Arc::new(client) as Arc<dyn Enricher>)
                }
                Err(e) if config.enrichment.enabled => {
                    tracing::warn!("Enrichment unavailable: {}", e);
                    None
                }
                Err(_) => {
                    tracing::info!("Enrichment disabled in configuration");
                    None
                }
            };

        let enrichment = EnrichmentStage::new(enricher, &config.enrichment);

        Ok(Self {
            config: Arc::new(config),
            config_hash: String::new(),
            fetcher,
            renderer,
            strategies: Arc::new(default_strategies()),
            enrichment,
            ledger: None,
            status: StatusReporter::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the enrichment capability
    pub fn with_enricher(mut self, enricher: Option<Arc<dyn Enricher>>) -> Self {
        self.enrichment = EnrichmentStage::new(enricher, &self.config.enrichment);
        self
    }

    /// Replaces the rendered-fetch backend
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replaces the ordered list of listing strategies
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ListingStrategy>>) -> Self {
        self.strategies = Arc::new(strategies);
        self
    }

    /// Records every run in `ledger`
    pub fn with_ledger(mut self, ledger: SqliteStorage, config_hash: impl Into<String>) -> Self {
        self.ledger = Some(Arc::new(Mutex::new(ledger)));
        self.config_hash = config_hash.into();
        self
    }

    /// Uses an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns a read-only handle on the run status
    pub fn status(&self) -> StatusHandle {
        self.status.handle()
    }

    /// Returns the token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn workers(&self) -> usize {
        self.config.scraper.workers.clamp(1, MAX_WORKERS)
    }

    fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.config.scraper.render_timeout_secs)
    }

    fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.output.directory)
    }

    // ===== Ledger =====

    fn ledger_start(&self, mode: RunMode) -> Option<i64> {
        let ledger = self.ledger.as_ref()?;
        let mut ledger = match ledger.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!("Run ledger unavailable: {}", e);
                return None;
            }
        };

        match ledger.start_run(mode, &self.config_hash) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Failed to record run start: {}", e);
                None
            }
        }
    }

    fn ledger_finish(
        &self,
        run_id: Option<i64>,
        status: LedgerStatus,
        stats: &RunStats,
        failures: &[ItemFailure],
        error: Option<&str>,
    ) {
        let (Some(run_id), Some(ledger)) = (run_id, self.ledger.as_ref()) else {
            return;
        };

        let mut ledger = match ledger.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!("Run ledger unavailable: {}", e);
                return;
            }
        };

        if let Err(e) = ledger.record_failures(run_id, failures) {
            tracing::warn!("Failed to record item failures for run {}: {}", run_id, e);
        }
        if let Err(e) = ledger.finish_run(run_id, status, stats, error) {
            tracing::warn!("Failed to record end of run {}: {}", run_id, e);
        }
    }

    // ===== Runs =====

    /// Runs the full pipeline over a list of category URLs
    ///
    /// Per-item failures are recorded and never abort the run. Only a
    /// failure to write the exports, or a fault in the coordinator itself,
    /// ends the run with an error.
    ///
    /// # Arguments
    ///
    /// * `category_urls` - Category pages, in the order their series are listed
    /// * `series_filter` - Indices into the flattened series list to keep;
    ///   `None` or empty keeps every series, out-of-range indices are ignored
    ///
    /// # Returns
    ///
    /// * `Ok(RunOutcome)` - Statistics, failures and written exports
    /// * `Err(HarvestError)` - The run failed
    pub async fn run(
        &self,
        category_urls: &[String],
        series_filter: Option<&[usize]>,
    ) -> Result<RunOutcome> {
        let started = Instant::now();
        let run_id = self.ledger_start(RunMode::Harvest);
        tracing::info!(
            "Starting harvest of {} categories with {} workers",
            category_urls.len(),
            self.workers()
        );

        let mut stats = RunStats {
            categories_count: category_urls.len(),
            ..RunStats::default()
        };
        let mut failures = Vec::new();

        let result = self
            .harvest(category_urls, series_filter, &mut stats, &mut failures)
            .await;
        stats.duration_seconds = started.elapsed().as_secs_f64();

        self.conclude(run_id, result, stats, failures)
    }

    /// Re-runs enrichment and persistence over previously exported products
    ///
    /// Locally stored specification images are reused; nothing is fetched
    /// from the catalog.
    pub async fn reprocess(&self, products: Vec<EnrichedProduct>) -> Result<RunOutcome> {
        let started = Instant::now();
        let run_id = self.ledger_start(RunMode::Reprocess);
        tracing::info!("Reprocessing {} products", products.len());

        let marker = &self.config.partition.path_marker;
        let mut stats = RunStats {
            categories_count: partition_by_category(&products, marker).len(),
            series_count: products
                .iter()
                .map(|p| p.stub().series_url.as_str())
                .collect::<HashSet<_>>()
                .len(),
            products_count: products.len(),
            ..RunStats::default()
        };
        let mut failures = Vec::new();

        let indexed: Vec<(usize, EnrichedProduct)> = products.into_iter().enumerate().collect();
        let result = self.finish_products(indexed, &mut stats, &mut failures).await;
        stats.duration_seconds = started.elapsed().as_secs_f64();

        self.conclude(run_id, result, stats, failures)
    }

    fn conclude(
        &self,
        run_id: Option<i64>,
        result: Result<Option<ExportArtifacts>>,
        stats: RunStats,
        failures: Vec<ItemFailure>,
    ) -> Result<RunOutcome> {
        let cancelled = self.cancel.is_cancelled();

        match result {
            Ok(artifacts) => {
                self.status.enter(RunPhase::Done);
                let status = if cancelled {
                    LedgerStatus::Interrupted
                } else {
                    LedgerStatus::Completed
                };
                self.ledger_finish(run_id, status, &stats, &failures, None);

                tracing::info!(
                    "Run finished: {} of {} products saved, {} errors, {} item failures in {:.1}s",
                    stats.success_count,
                    stats.products_count,
                    stats.error_count,
                    failures.len(),
                    stats.duration_seconds
                );

                Ok(RunOutcome {
                    stats,
                    failures,
                    artifacts,
                    cancelled,
                    run_id,
                })
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Run failed: {}", message);
                self.status.fail(&message);
                self.ledger_finish(
                    run_id,
                    LedgerStatus::Failed,
                    &stats,
                    &failures,
                    Some(&message),
                );
                Err(e)
            }
        }
    }

    async fn harvest(
        &self,
        category_urls: &[String],
        series_filter: Option<&[usize]>,
        stats: &mut RunStats,
        failures: &mut Vec<ItemFailure>,
    ) -> Result<Option<ExportArtifacts>> {
        self.status.enter(RunPhase::ExtractingSeries);
        let series = self.extract_all_series(category_urls, failures).await;
        let series = select_series(series, series_filter);
        stats.series_count = series.len();

        if series.is_empty() {
            tracing::warn!("No series to process");
            stats.settle(0);
            return Ok(None);
        }

        self.status.enter(RunPhase::ExtractingProducts);
        let stubs = self.extract_all_products(series, failures).await;
        stats.products_count = stubs.len();

        if stubs.is_empty() {
            tracing::warn!("No products listed in the selected series");
            stats.settle(0);
            return Ok(None);
        }

        let indexed: Vec<(usize, ProductStub)> = stubs.into_iter().enumerate().collect();

        self.status.enter(RunPhase::ExtractingDetails);
        let details = self.extract_all_details(indexed, failures).await;

        self.status.enter(RunPhase::ProcessingImages);
        let products = self.process_all_images(details, failures).await;

        self.finish_products(products, stats, failures).await
    }

    /// Enrichment and persistence, shared by full and reprocess runs
    async fn finish_products(
        &self,
        products: Vec<(usize, EnrichedProduct)>,
        stats: &mut RunStats,
        failures: &mut Vec<ItemFailure>,
    ) -> Result<Option<ExportArtifacts>> {
        let mut products = if self.enrichment.is_available() {
            self.status.enter(RunPhase::Enriching);
            self.enrich_all(products, failures).await
        } else {
            tracing::info!("Enrichment unavailable, skipping");
            products
        };

        products.sort_by_key(|(index, _)| *index);
        let products: Vec<EnrichedProduct> = products.into_iter().map(|(_, p)| p).collect();

        if products.is_empty() {
            tracing::warn!("No products survived extraction; nothing to persist");
            stats.settle(0);
            return Ok(None);
        }

        self.status.enter(RunPhase::Persisting);
        let artifacts = self.persist(products.clone()).await?;
        stats.settle(products.len());

        Ok(Some(artifacts))
    }

    // ===== Stages =====

    async fn extract_all_series(
        &self,
        category_urls: &[String],
        failures: &mut Vec<ItemFailure>,
    ) -> Vec<Series> {
        let indexed: Vec<(usize, String)> = category_urls.iter().cloned().enumerate().collect();
        let fetcher = self.fetcher.clone();

        let fan_in = fan_out(indexed, self.workers(), &self.cancel, move |(index, url)| {
            let fetcher = fetcher.clone();
            async move {
                let result = extract_series(&fetcher, &url).await;
                (index, url, result)
            }
        })
        .await;

        let mut per_category = collect_stage(fan_in, RunPhase::ExtractingSeries, failures);
        per_category.sort_by_key(|(index, _, _)| *index);

        let mut series = Vec::new();
        for (_, url, result) in per_category {
            match result {
                Ok(found) if found.is_empty() => {
                    tracing::warn!("No series found in {}, skipping", url);
                    failures.push(ItemFailure::new(
                        RunPhase::ExtractingSeries,
                        url,
                        "no series found",
                    ));
                }
                Ok(found) => {
                    tracing::info!("Extracted {} series from {}", found.len(), url);
                    series.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Failed to extract series from {}: {}", url, e);
                    failures.push(ItemFailure::new(
                        RunPhase::ExtractingSeries,
                        url,
                        e.to_string(),
                    ));
                }
            }
        }

        tracing::info!("Total series: {}", series.len());
        series
    }

    async fn extract_all_products(
        &self,
        series: Vec<Series>,
        failures: &mut Vec<ItemFailure>,
    ) -> Vec<ProductStub> {
        let indexed: Vec<(usize, Series)> = series.into_iter().enumerate().collect();
        let fetcher = self.fetcher.clone();
        let renderer = Arc::clone(&self.renderer);
        let strategies = Arc::clone(&self.strategies);
        let fallback = self
            .config
            .scraper
            .render_series_fallback
            .then(|| self.render_timeout());

        let fan_in = fan_out(indexed, self.workers(), &self.cancel, move |(index, series)| {
            let fetcher = fetcher.clone();
            let renderer = Arc::clone(&renderer);
            let strategies = Arc::clone(&strategies);
            async move {
                let result = extract_products(
                    &fetcher,
                    renderer.as_ref(),
                    strategies.as_slice(),
                    &series,
                    fallback,
                )
                .await;
                (index, series, result)
            }
        })
        .await;

        let mut per_series = collect_stage(fan_in, RunPhase::ExtractingProducts, failures);
        per_series.sort_by_key(|(index, _, _)| *index);

        let mut stubs = Vec::new();
        for (_, series, result) in per_series {
            match result {
                Ok(found) if found.is_empty() => {
                    tracing::warn!("No products listed in series {}, skipping", series.name);
                    failures.push(ItemFailure::new(
                        RunPhase::ExtractingProducts,
                        series.url,
                        "no products found",
                    ));
                }
                Ok(found) => {
                    tracing::info!("Extracted {} products from series {}", found.len(), series.name);
                    stubs.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Failed to extract products from {}: {}", series.url, e);
                    failures.push(ItemFailure::new(
                        RunPhase::ExtractingProducts,
                        series.url,
                        e.to_string(),
                    ));
                }
            }
        }

        tracing::info!("Total products: {}", stubs.len());
        stubs
    }

    async fn extract_all_details(
        &self,
        stubs: Vec<(usize, ProductStub)>,
        failures: &mut Vec<ItemFailure>,
    ) -> Vec<(usize, ProductDetail)> {
        let renderer = Arc::clone(&self.renderer);
        let timeout = self.render_timeout();

        let fan_in = fan_out(stubs, self.workers(), &self.cancel, move |(index, stub)| {
            let renderer = Arc::clone(&renderer);
            async move {
                let code = stub.code.clone();
                let result = extract_detail(renderer.as_ref(), stub, timeout).await;
                (index, code, result)
            }
        })
        .await;

        // Unstarted products never got a detail record and drop out here
        for (_, stub) in &fan_in.unstarted {
            failures.push(ItemFailure::new(
                RunPhase::ExtractingDetails,
                stub.code.clone(),
                "cancelled before detail extraction",
            ));
        }

        let mut details = Vec::new();
        for (index, code, result) in collect_stage(fan_in, RunPhase::ExtractingDetails, failures) {
            match result {
                Ok(detail) => {
                    tracing::debug!("Extracted detail for {}", code);
                    details.push((index, detail));
                }
                Err(e) => {
                    tracing::warn!("Failed to extract detail for {}: {}", code, e);
                    failures.push(ItemFailure::new(
                        RunPhase::ExtractingDetails,
                        code,
                        e.to_string(),
                    ));
                }
            }
        }

        tracing::info!("Extracted {} product details", details.len());
        details
    }

    async fn process_all_images(
        &self,
        details: Vec<(usize, ProductDetail)>,
        failures: &mut Vec<ItemFailure>,
    ) -> Vec<(usize, EnrichedProduct)> {
        let pipeline = ImagePipeline::new(
            self.fetcher.clone(),
            self.output_dir().join(IMAGES_DIR),
            self.config.output.image_quality,
        );

        let mut fan_in = fan_out(details, self.workers(), &self.cancel, move |(index, detail)| {
            let pipeline = pipeline.clone();
            async move { (index, pipeline.process(detail).await) }
        })
        .await;

        // Cancelled products keep their detail record without local images
        let skipped: Vec<(usize, EnrichedProduct)> = std::mem::take(&mut fan_in.unstarted)
            .into_iter()
            .map(|(index, detail)| (index, EnrichedProduct::new(detail, ProductImages::default())))
            .collect();

        let mut products = Vec::new();
        for (index, (product, image_failures)) in
            collect_stage(fan_in, RunPhase::ProcessingImages, failures)
        {
            failures.extend(image_failures);
            products.push((index, product));
        }
        products.extend(skipped);

        tracing::info!("Processed images for {} products", products.len());
        products
    }

    async fn enrich_all(
        &self,
        products: Vec<(usize, EnrichedProduct)>,
        failures: &mut Vec<ItemFailure>,
    ) -> Vec<(usize, EnrichedProduct)> {
        let stage = self.enrichment.clone();
        let workers = self
            .config
            .scraper
            .effective_enrichment_workers()
            .min(self.workers());

        let mut fan_in = fan_out(products, workers, &self.cancel, move |(index, product)| {
            let stage = stage.clone();
            async move { (index, stage.enrich(product).await) }
        })
        .await;

        // Cancelled products are persisted without enrichment
        let skipped = std::mem::take(&mut fan_in.unstarted);

        let mut products = Vec::new();
        for (index, (product, enrich_failures)) in
            collect_stage(fan_in, RunPhase::Enriching, failures)
        {
            failures.extend(enrich_failures);
            products.push((index, product));
        }
        products.extend(skipped);

        tracing::info!("Enriched {} products", products.len());
        products
    }

    async fn persist(&self, products: Vec<EnrichedProduct>) -> Result<ExportArtifacts> {
        let directory = self.output_dir();
        let prefix = self.config.output.file_prefix.clone();
        let marker = self.config.partition.path_marker.clone();
        let timestamp = output::run_timestamp();

        let artifacts = tokio::task::spawn_blocking(move || {
            output::persist(&products, &directory, &prefix, &marker, &timestamp)
        })
        .await
        .map_err(|e| HarvestError::Internal(format!("persistence task failed: {}", e)))??;

        Ok(artifacts)
    }
}

/// Collects a stage's results, recording panicked tasks as failures
fn collect_stage<T, R>(
    fan_in: FanIn<T, R>,
    phase: RunPhase,
    failures: &mut Vec<ItemFailure>,
) -> Vec<R> {
    for _ in 0..fan_in.failed_tasks {
        failures.push(ItemFailure::new(phase, "worker task", "task panicked"));
    }
    fan_in.results
}

/// Keeps the series whose position in `series` is listed in `filter`
///
/// `None` or an empty filter keeps everything; out-of-range indices are
/// ignored.
pub fn select_series(series: Vec<Series>, filter: Option<&[usize]>) -> Vec<Series> {
    let Some(filter) = filter.filter(|f| !f.is_empty()) else {
        return series;
    };

    let wanted: BTreeSet<usize> = filter.iter().copied().collect();
    for index in wanted.iter().filter(|&&i| i >= series.len()) {
        tracing::warn!("Series index {} out of range (0..{}), ignored", index, series.len());
    }

    series
        .into_iter()
        .enumerate()
        .filter(|(index, _)| wanted.contains(index))
        .map(|(_, series)| series)
        .collect()
}

/// Runs a complete harvest
///
/// This is the main entry point. It will:
/// 1. Clamp the worker count to the supported range
/// 2. Build the fetch client, renderer and enrichment capability
/// 3. Run every stage over every category
/// 4. Persist the results and return the run statistics
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `category_urls` - Category pages to harvest
/// * `worker_count` - Worker pool size for each stage
///
/// # Returns
///
/// * `Ok(RunStats)` - The run finished
/// * `Err(HarvestError)` - The run failed
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let urls = config.categories.clone();
/// let stats = catalog_harvest::run(config, &urls, 5).await?;
/// println!("{} products saved", stats.success_count);
/// # Ok(())
/// # }
/// ```
pub async fn run(mut config: Config, category_urls: &[String], worker_count: usize) -> Result<RunStats> {
    config.scraper.workers = worker_count.clamp(1, MAX_WORKERS);
    let pipeline = Pipeline::new(config).await?;
    let outcome = pipeline.run(category_urls, None).await?;
    Ok(outcome.stats)
}
