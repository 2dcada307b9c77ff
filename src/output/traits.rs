//! Export writer trait and error types
//!
//! An export writer turns the persisted record set into the bytes of one
//! file. Writers never touch the filesystem themselves; the persister places
//! their output atomically.

use super::PersistedRecord;
use thiserror::Error;

/// Errors that can occur while writing exports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for export formats
///
/// Every writer receives records with the same column set, so the full
/// export and each partition export share one schema.
pub trait ExportWriter: Send + Sync {
    /// File extension (without the dot) of the produced file
    fn extension(&self) -> &'static str;

    /// Renders the records into file contents
    ///
    /// # Arguments
    ///
    /// * `records` - The records to export, in output order
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - The encoded file
    /// * `Err(OutputError)` - Encoding failed
    fn render(&self, records: &[PersistedRecord]) -> OutputResult<Vec<u8>>;
}
