//! Persisted record and its tabular form

use crate::model::EnrichedProduct;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column headers shared by every tabular export
pub const COLUMNS: [&str; 12] = [
    "Product code",
    "Name (English)",
    "Name (translated)",
    "Series",
    "Group",
    "Features",
    "Product URL",
    "Product image",
    "Specification image",
    "Wiring diagram image",
    "Dimension image",
    "Specification table (HTML)",
];

/// A product as written to the full export
///
/// Unset optional fields serialize as `null` so every record has the same
/// keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Category partition key of the product
    #[serde(default)]
    pub category: String,

    #[serde(flatten)]
    pub product: EnrichedProduct,
}

impl PersistedRecord {
    pub fn new(category: impl Into<String>, product: EnrichedProduct) -> Self {
        Self {
            category: category.into(),
            product,
        }
    }
}

/// One row of a tabular export, in [`COLUMNS`] order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow(pub [String; 12]);

impl ExportRow {
    pub fn cells(&self) -> &[String; 12] {
        &self.0
    }
}

fn path_cell(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

impl From<&EnrichedProduct> for ExportRow {
    fn from(product: &EnrichedProduct) -> Self {
        let stub = product.stub();
        let images = &product.images;

        ExportRow([
            stub.code.clone(),
            product.detail.title.clone(),
            product.translated_name.clone().unwrap_or_default(),
            stub.series_name.clone(),
            stub.group_name.clone(),
            stub.features.clone(),
            stub.detail_url.clone(),
            path_cell(images.product_local_path.as_deref()),
            path_cell(images.spec_local_path.as_deref()),
            path_cell(images.wiring_local_path.as_deref()),
            path_cell(images.dimension_local_path.as_deref()),
            product.spec_table_html.clone().unwrap_or_default(),
        ])
    }
}
