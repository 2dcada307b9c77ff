//! Record types flowing through the pipeline
//!
//! Each stage takes ownership of the batch it processes and returns a new
//! batch with more fields populated. The product `code` travels unchanged from
//! the listing stage all the way to persistence.

mod product;

pub use product::{EnrichedProduct, ProductDetail, ProductImages, ProductStub};

use crate::state::RunPhase;
use serde::{Deserialize, Serialize};

/// Placeholder name for a series card without a heading
pub const UNKNOWN_SERIES: &str = "Unknown Series";

/// Placeholder name for a product group without a heading
pub const UNKNOWN_GROUP: &str = "Unknown Group";

/// A named sub-grouping of products within a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Display name of the series
    pub name: String,

    /// Absolute URL of the series page
    pub url: String,

    /// Absolute URL of the series thumbnail (empty when absent)
    pub thumbnail_url: String,

    /// Short description text (empty when absent)
    pub description: String,
}

/// A per-item failure recorded in the run statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// The stage the failure happened in
    pub phase: RunPhase,

    /// Product code or URL identifying the failed item
    pub subject: String,

    /// Human-readable reason
    pub message: String,
}

impl ItemFailure {
    pub fn new(phase: RunPhase, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase,
            subject: subject.into(),
            message: message.into(),
        }
    }
}
