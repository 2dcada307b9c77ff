//! End-to-end runs against a mock catalog

use async_trait::async_trait;
use catalog_harvest::config::{Config, EnrichmentConfig, OutputConfig, ScraperConfig};
use catalog_harvest::enrich::{Enricher, EnrichmentError};
use catalog_harvest::output::{load_products, UNKNOWN_PARTITION};
use catalog_harvest::storage::{open_storage, LedgerStatus, RunLedger};
use catalog_harvest::{Pipeline, RunPhase};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATEGORY_PAGE: &str = r#"
<html><body>
  <section class="bg-light">
    <div class="card mb-4">
      <div class="box-img" style="background-image:url('/img/ps-thumb.png')"></div>
      <h4>PS Series</h4>
      <p class="txt-l3">Inductive proximity sensors</p>
      <a class="stretched-link" href="/en-gb/product-category/72/113"></a>
    </div>
    <div class="card mb-4">
      <h4>Long Range</h4>
      <a class="stretched-link" href="/series/long-range"></a>
    </div>
  </section>
</body></html>"#;

const GROUPED_SERIES_PAGE: &str = r#"
<html><body>
  <div class="item-type">
    <h5>Cylindrical</h5>
    <ul>
      <li><span>PS-05N</span><span>NPN NO</span><span><a href="/en-gb/product/501">Specs</a></span></li>
      <li><span>PS-05P</span><span>PNP NO</span><span><a href="/en-gb/product/502">Specs</a></span></li>
    </ul>
  </div>
</body></html>"#;

const FLAT_SERIES_PAGE: &str = r#"
<html><body>
  <div class="list">
    <div class="row"><span>PS-10N</span><span>Long range NPN</span><a href="/en-gb/product/601">more</a></div>
  </div>
</body></html>"#;

const DETAIL_501: &str = r#"
<html><body>
  <p class="title-card">PS Series Proximity Sensor</p>
  <div class="gallery"><div class="item"><a href="/img/501.png"></a></div></div>
  <div class="tab-content"><div id="tab1"><img src="/img/spec-501.png"></div></div>
</body></html>"#;

const DETAIL_601: &str = r#"
<html><body>
  <h1>Long Range Sensor</h1>
  <div class="tab-content"><div id="tab1"><img src="/img/missing.png"></div></div>
</body></html>"#;

const EMPTY_PAGE: &str = "<html><body><p>nothing</p></body></html>";

/// Enricher returning canned answers and counting calls
#[derive(Default)]
struct CannedEnricher {
    translations: AtomicUsize,
    tables: AtomicUsize,
}

#[async_trait]
impl Enricher for CannedEnricher {
    async fn translate(&self, text: &str, _target: &str) -> Result<String, EnrichmentError> {
        self.translations.fetch_add(1, Ordering::SeqCst);
        Ok(format!("**Cảm biến {}**", text))
    }

    async fn extract_table_from_image(
        &self,
        image: &[u8],
        _mime_type: &str,
        _instructions: &str,
    ) -> Result<String, EnrichmentError> {
        assert!(!image.is_empty());
        self.tables.fetch_add(1, Ordering::SeqCst);
        Ok("```html\n<table><tbody><tr><td>Điện áp</td><td>12-24V</td></tr></tbody></table>\n```"
            .to_string())
    }
}

fn png() -> Vec<u8> {
    let img = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 128]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

async fn serve_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html"))
        .mount(server)
        .await;
}

async fn serve_png(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png(), "image/png"))
        .mount(server)
        .await;
}

/// Catalog with two series and three products
///
/// `/en-gb/product/502` and `/img/missing.png` are not mounted and answer 404.
async fn mock_catalog() -> MockServer {
    let server = MockServer::start().await;

    serve_html(&server, "/en-gb/product-category/72", CATEGORY_PAGE).await;
    serve_html(&server, "/en-gb/product-category/72/113", GROUPED_SERIES_PAGE).await;
    serve_html(&server, "/series/long-range", FLAT_SERIES_PAGE).await;
    serve_html(&server, "/en-gb/product/501", DETAIL_501).await;
    serve_html(&server, "/en-gb/product/601", DETAIL_601).await;
    serve_png(&server, "/img/501.png").await;
    serve_png(&server, "/img/spec-501.png").await;

    server
}

fn test_config(output_dir: &Path) -> Config {
    Config {
        scraper: ScraperConfig {
            workers: 3,
            max_attempts: 2,
            backoff_base_ms: 10,
            request_timeout_secs: 5,
            render_timeout_secs: 5,
            ..ScraperConfig::default()
        },
        output: OutputConfig {
            directory: output_dir.to_string_lossy().into_owned(),
            ledger_path: output_dir.join("ledger.db").to_string_lossy().into_owned(),
            ..OutputConfig::default()
        },
        enrichment: EnrichmentConfig {
            enabled: false,
            ..EnrichmentConfig::default()
        },
        ..Config::default()
    }
}

fn category_url(server: &MockServer) -> String {
    format!("{}/en-gb/product-category/72", server.uri())
}

#[tokio::test]
async fn test_full_run_tolerates_item_failures() {
    let server = mock_catalog().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let ledger_path = dir.path().join("ledger.db");

    let enricher = Arc::new(CannedEnricher::default());
    let pipeline = Pipeline::new(config)
        .await
        .unwrap()
        .with_enricher(Some(enricher.clone() as Arc<dyn Enricher>))
        .with_ledger(open_storage(&ledger_path).unwrap(), "test-hash");

    let outcome = pipeline.run(&[category_url(&server)], None).await.unwrap();
    let stats = &outcome.stats;

    assert_eq!(stats.categories_count, 1);
    assert_eq!(stats.series_count, 2);
    assert_eq!(stats.products_count, 3);
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.success_count + stats.error_count, stats.products_count);
    assert!(!outcome.cancelled);

    // One detail page and one specification image were unreachable
    let detail_failures: Vec<_> = outcome
        .failures
        .iter()
        .filter(|f| f.phase == RunPhase::ExtractingDetails)
        .collect();
    assert_eq!(detail_failures.len(), 1);
    assert_eq!(detail_failures[0].subject, "PS-05P");
    assert!(outcome
        .failures
        .iter()
        .any(|f| f.phase == RunPhase::ProcessingImages && f.subject == "PS-10N"));

    let status = pipeline.status().snapshot();
    assert_eq!(status.phase, RunPhase::Done);
    assert_eq!(status.progress_percent, 100);
    assert!(!status.is_running);

    // Only PS-05N had a specification image to read
    assert_eq!(enricher.translations.load(Ordering::SeqCst), 2);
    assert_eq!(enricher.tables.load(Ordering::SeqCst), 1);

    let artifacts = outcome.artifacts.clone().unwrap();
    assert!(artifacts.full_json.exists());
    assert!(artifacts.full_spreadsheet.exists());
    let keys: Vec<&str> = artifacts.partitions.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["72", UNKNOWN_PARTITION]);
    assert!(artifacts.partitions.iter().all(|(_, p)| p.exists()));

    let saved = load_products(&artifacts.full_json).unwrap();
    let codes: Vec<&str> = saved.iter().map(|p| p.code()).collect();
    assert_eq!(codes, vec!["PS-05N", "PS-10N"]);
    assert_eq!(codes.iter().collect::<HashSet<_>>().len(), codes.len());

    let first = &saved[0];
    assert_eq!(first.stub().group_name, "Cylindrical");
    assert_eq!(
        first.translated_name.as_deref(),
        Some("Cảm biến PS Series Proximity Sensor")
    );
    let table = first.spec_table_html.as_deref().unwrap();
    assert!(table.starts_with("<table>"));
    assert!(table.contains("Haiphongtech.vn"));
    assert!(first.images.product_local_path.as_ref().unwrap().exists());
    assert!(first.images.spec_local_path.as_ref().unwrap().exists());

    let second = &saved[1];
    assert_eq!(second.detail.title, "Long Range Sensor");
    assert_eq!(second.images.product_local_path, None);
    assert_eq!(second.images.spec_local_path, None);
    assert_eq!(second.spec_table_html, None);

    let run_id = outcome.run_id.unwrap();
    drop(pipeline);
    let ledger = open_storage(&ledger_path).unwrap();
    let run = ledger.get_run(run_id).unwrap();
    assert_eq!(run.status, LedgerStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.products_count, 3);
    assert_eq!(run.success_count, 2);
    assert_eq!(
        ledger.failures_for_run(run_id).unwrap().len(),
        outcome.failures.len()
    );
}

#[tokio::test]
async fn test_series_selection() {
    let server = mock_catalog().await;
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Pipeline::new(test_config(dir.path())).await.unwrap();
    let outcome = pipeline
        .run(&[category_url(&server)], Some(&[1, 5]))
        .await
        .unwrap();

    assert_eq!(outcome.stats.series_count, 1);
    assert_eq!(outcome.stats.products_count, 1);
    assert_eq!(outcome.stats.success_count, 1);

    let artifacts = outcome.artifacts.unwrap();
    let keys: Vec<&str> = artifacts.partitions.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec![UNKNOWN_PARTITION]);

    // No enricher configured: fields stay unset
    let saved = load_products(&artifacts.full_json).unwrap();
    assert_eq!(saved[0].translated_name, None);
}

#[tokio::test]
async fn test_unreachable_category_yields_empty_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Pipeline::new(test_config(dir.path())).await.unwrap();
    let url = format!("{}/en-gb/product-category/99", server.uri());
    let outcome = pipeline.run(&[url.clone()], None).await.unwrap();

    assert_eq!(outcome.stats.series_count, 0);
    assert_eq!(outcome.stats.products_count, 0);
    assert!(outcome.artifacts.is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].phase, RunPhase::ExtractingSeries);
    assert_eq!(outcome.failures[0].subject, url);
    assert_eq!(pipeline.status().snapshot().phase, RunPhase::Done);
}

#[tokio::test]
async fn test_category_without_series_is_a_failure() {
    let server = MockServer::start().await;
    serve_html(&server, "/en-gb/product-category/72", EMPTY_PAGE).await;
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Pipeline::new(test_config(dir.path())).await.unwrap();
    let url = category_url(&server);
    let outcome = pipeline.run(&[url.clone()], None).await.unwrap();

    assert_eq!(outcome.stats.series_count, 0);
    assert!(outcome.artifacts.is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].phase, RunPhase::ExtractingSeries);
    assert_eq!(outcome.failures[0].subject, url);
    assert_eq!(outcome.failures[0].message, "no series found");
}

#[tokio::test]
async fn test_series_without_products_is_a_failure() {
    let server = MockServer::start().await;
    serve_html(&server, "/en-gb/product-category/72", CATEGORY_PAGE).await;
    serve_html(&server, "/en-gb/product-category/72/113", EMPTY_PAGE).await;
    serve_html(&server, "/series/long-range", FLAT_SERIES_PAGE).await;
    serve_html(&server, "/en-gb/product/601", DETAIL_601).await;
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Pipeline::new(test_config(dir.path())).await.unwrap();
    let outcome = pipeline.run(&[category_url(&server)], None).await.unwrap();

    assert_eq!(outcome.stats.series_count, 2);
    assert_eq!(outcome.stats.products_count, 1);

    let empty: Vec<_> = outcome
        .failures
        .iter()
        .filter(|f| f.phase == RunPhase::ExtractingProducts)
        .collect();
    assert_eq!(empty.len(), 1);
    assert_eq!(
        empty[0].subject,
        format!("{}/en-gb/product-category/72/113", server.uri())
    );
    assert_eq!(empty[0].message, "no products found");
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = mock_catalog().await;
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Pipeline::new(test_config(dir.path())).await.unwrap();
    pipeline.cancellation_token().cancel();

    let outcome = pipeline.run(&[category_url(&server)], None).await.unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.artifacts.is_none());
    assert_eq!(outcome.stats.products_count, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reprocess_previous_export() {
    let server = mock_catalog().await;
    let dir = tempfile::tempdir().unwrap();

    let first = Pipeline::new(test_config(dir.path())).await.unwrap();
    let outcome = first.run(&[category_url(&server)], None).await.unwrap();
    let previous = load_products(&outcome.artifacts.unwrap().full_json).unwrap();
    assert!(previous.iter().all(|p| p.spec_table_html.is_none()));

    let requests_before = server.received_requests().await.unwrap().len();

    let enricher = Arc::new(CannedEnricher::default());
    let reprocess_dir = dir.path().join("reprocessed");
    let pipeline = Pipeline::new(test_config(&reprocess_dir))
        .await
        .unwrap()
        .with_enricher(Some(enricher.clone() as Arc<dyn Enricher>));
    let outcome = pipeline.reprocess(previous).await.unwrap();

    assert_eq!(outcome.stats.products_count, 2);
    assert_eq!(outcome.stats.series_count, 2);
    assert_eq!(outcome.stats.categories_count, 2);
    assert_eq!(outcome.stats.success_count, 2);
    assert_eq!(enricher.tables.load(Ordering::SeqCst), 1);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_before
    );

    let saved = load_products(&outcome.artifacts.unwrap().full_json).unwrap();
    assert!(saved[0].spec_table_html.is_some());
    assert!(saved.iter().all(|p| p.translated_name.is_some()));
}

#[tokio::test]
async fn test_run_entry_point_returns_stats() {
    let server = mock_catalog().await;
    let dir = tempfile::tempdir().unwrap();

    let stats = catalog_harvest::run(test_config(dir.path()), &[category_url(&server)], 50)
        .await
        .unwrap();

    assert_eq!(stats.products_count, 3);
    assert_eq!(stats.success_count + stats.error_count, stats.products_count);
    assert!(stats.duration_seconds >= 0.0);
}
