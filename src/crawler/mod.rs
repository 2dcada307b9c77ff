//! Crawler module for catalog extraction
//!
//! This module contains the core pipeline logic, including:
//! - HTTP fetching with retry and exponential backoff
//! - Rendered fetches for script-built pages
//! - Series, product listing and product detail extraction
//! - Bounded fan-out of each stage over a worker pool
//! - Overall run coordination

mod coordinator;
mod detail;
mod fetcher;
mod parser;
mod pool;
mod products;
mod renderer;
mod series;

pub use coordinator::{run, select_series, Pipeline, RunOutcome, IMAGES_DIR};
pub use detail::{extract_detail, parse_detail, DETAIL_READY_SELECTOR};
pub use fetcher::{backoff_delay, build_http_client, FetchPolicy, Fetcher};
pub use pool::{fan_out, FanIn};
pub use products::{
    default_strategies, extract_products, parse_products, DetailLinkScan, GroupedSections,
    ListingStrategy,
};
pub use renderer::{build_renderer, selector_matches, PageRenderer, StaticRenderer};
pub use series::{extract_series, parse_series};

#[cfg(feature = "browser")]
pub use renderer::ChromeRenderer;
