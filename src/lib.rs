//! Catalog-Harvest: a concurrent catalog extraction and enrichment pipeline
//!
//! This crate turns a fixed list of catalog-category URLs into enriched product
//! records (names, images, specification tables, translated metadata) and
//! persists them as a full export plus one export per category partition.

pub mod config;
pub mod crawler;
pub mod enrich;
pub mod images;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Run-level error type for Catalog-Harvest operations
///
/// Per-item failures never surface here; they are tallied in the run
/// statistics instead. Only configuration problems, an unwritable output
/// location, or a fault in the orchestrator itself abort a run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal pipeline error: {0}")]
    Internal(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Network fetch errors
///
/// Returned once the retry budget is spent. The caller decides whether the
/// failure is fatal to its item or merely leaves a field unavailable.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transient failure for {url} after {attempts} attempts: {message}")]
    Transient {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("HTTP {status} for {url} after {attempts} attempts")]
    Permanent {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("Timed out waiting for {url} to become ready")]
    RenderTimeout { url: String },

    #[error("Failed to render {url}: {message}")]
    Render { url: String, message: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Returns true if a later attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RenderTimeout { .. })
    }

    /// The URL the failure refers to
    pub fn url(&self) -> &str {
        match self {
            Self::Transient { url, .. }
            | Self::Permanent { url, .. }
            | Self::RenderTimeout { url }
            | Self::Render { url, .. }
            | Self::InvalidUrl { url } => url,
        }
    }
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run, Pipeline, RunOutcome};
pub use model::{EnrichedProduct, ProductDetail, ProductImages, ProductStub, Series};
pub use output::RunStats;
pub use state::{RunPhase, RunStatus, StatusHandle};
