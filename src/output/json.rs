//! JSON export
//!
//! The full export doubles as the input of a reprocess run.

use super::{ExportWriter, OutputResult, PersistedRecord};
use crate::model::EnrichedProduct;
use std::path::Path;

/// Pretty-printed JSON array of persisted records
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExport;

impl ExportWriter for JsonExport {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, records: &[PersistedRecord]) -> OutputResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(records)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Loads the products of a previous full JSON export
///
/// # Arguments
///
/// * `path` - Path to a `*_products_*.json` file
///
/// # Returns
///
/// * `Ok(Vec<EnrichedProduct>)` - Products in file order
/// * `Err(OutputError)` - The file could not be read or parsed
pub fn load_products(path: &Path) -> OutputResult<Vec<EnrichedProduct>> {
    let contents = std::fs::read(path)?;
    let records: Vec<PersistedRecord> = serde_json::from_slice(&contents)?;
    Ok(records.into_iter().map(|record| record.product).collect())
}
