//! Configuration module for Catalog-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvest will use {} workers", config.scraper.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EnrichmentConfig, HttpConfig, OutputConfig, PartitionConfig, RendererKind,
    ScraperConfig,
};

// Re-export parser functions
pub use parser::{hash_content, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_category_url};

/// Upper bound on the configured worker count
pub const MAX_WORKERS: usize = 10;

/// Upper bound on concurrent enrichment calls, whatever the configured value
pub const MAX_ENRICHMENT_WORKERS: usize = 3;
