//! Output module for persisting harvest results
//!
//! This module handles:
//! - Partitioning products by category
//! - Writing the full export (JSON and spreadsheet) and one spreadsheet per partition
//! - Run statistics
//!
//! All files are written through a temporary file and renamed into place.

mod json;
mod partition;
mod record;
mod spreadsheet;
pub mod stats;
mod traits;

pub use json::{load_products, JsonExport};
pub use partition::{category_key, partition_by_category, UNKNOWN_PARTITION};
pub use record::{ExportRow, PersistedRecord, COLUMNS};
pub use spreadsheet::{column_width, SpreadsheetExport, MAX_COLUMN_WIDTH};
pub use stats::{print_run_stats, RunStats};
pub use traits::{ExportWriter, OutputError, OutputResult};

use crate::images::write_atomic;
use crate::model::EnrichedProduct;
use std::path::{Path, PathBuf};

/// Subdirectory of the output directory holding partition exports
pub const PARTITIONS_DIR: &str = "partitions";

/// Files written by one persistence step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportArtifacts {
    /// Full export, JSON
    pub full_json: PathBuf,

    /// Full export, spreadsheet
    pub full_spreadsheet: PathBuf,

    /// One spreadsheet per category key, ordered by key
    pub partitions: Vec<(String, PathBuf)>,
}

/// Timestamp embedded in export file names
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn write_export(
    writer: &dyn ExportWriter,
    path: PathBuf,
    records: &[PersistedRecord],
) -> OutputResult<PathBuf> {
    let bytes = writer.render(records)?;
    write_atomic(&path, &bytes)?;
    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(path)
}

/// Persists products as one full export plus one export per category
///
/// Every product lands in exactly one partition; products whose series URL
/// carries no category key go to [`UNKNOWN_PARTITION`].
///
/// # Arguments
///
/// * `products` - Products that survived every stage
/// * `directory` - Output root directory
/// * `file_prefix` - Prefix of every export file name
/// * `path_marker` - Path segment preceding the category key
/// * `timestamp` - Run timestamp embedded in the file names
///
/// # Returns
///
/// * `Ok(ExportArtifacts)` - Paths of every written file
/// * `Err(OutputError)` - A file could not be encoded or written
pub fn persist(
    products: &[EnrichedProduct],
    directory: &Path,
    file_prefix: &str,
    path_marker: &str,
    timestamp: &str,
) -> OutputResult<ExportArtifacts> {
    let records: Vec<PersistedRecord> = products
        .iter()
        .map(|product| {
            PersistedRecord::new(
                category_key(&product.stub().series_url, path_marker),
                product.clone(),
            )
        })
        .collect();

    let base = format!("{}_products_{}", file_prefix, timestamp);
    let full_json = write_export(
        &JsonExport,
        directory.join(format!("{}.{}", base, JsonExport.extension())),
        &records,
    )?;
    let full_spreadsheet = write_export(
        &SpreadsheetExport,
        directory.join(format!("{}.{}", base, SpreadsheetExport.extension())),
        &records,
    )?;

    let partition_dir = directory.join(PARTITIONS_DIR);
    let mut partitions = Vec::new();

    for (key, members) in partition_by_category(products, path_marker) {
        let partition_records: Vec<PersistedRecord> = members
            .into_iter()
            .map(|product| PersistedRecord::new(key.clone(), product.clone()))
            .collect();

        let path = partition_dir.join(format!(
            "{}_category_{}_{}.{}",
            file_prefix,
            key,
            timestamp,
            SpreadsheetExport.extension()
        ));
        let path = write_export(&SpreadsheetExport, path, &partition_records)?;
        partitions.push((key, path));
    }

    tracing::info!(
        "Persisted {} products in {} partitions",
        products.len(),
        partitions.len()
    );

    Ok(ExportArtifacts {
        full_json,
        full_spreadsheet,
        partitions,
    })
}
