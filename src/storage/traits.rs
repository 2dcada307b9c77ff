//! Storage traits and error types
//!
//! This module defines the trait interface for run ledger backends and
//! associated error types.

use crate::model::ItemFailure;
use crate::output::RunStats;
use crate::storage::{FailureRecord, LedgerStatus, RunMode, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for run ledger implementations
pub trait RunLedger {
    // ===== Run Management =====

    /// Records the start of a run
    ///
    /// # Arguments
    ///
    /// * `mode` - Full harvest or reprocess
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn start_run(&mut self, mode: RunMode, config_hash: &str) -> StorageResult<i64>;

    /// Records the end of a run with its statistics
    ///
    /// # Arguments
    ///
    /// * `run_id` - The run to close
    /// * `status` - Terminal status
    /// * `stats` - Final run statistics
    /// * `error` - Run-fatal error message, if any
    fn finish_run(
        &mut self,
        run_id: i64,
        status: LedgerStatus,
        stats: &RunStats,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Failure Tracking =====

    /// Records per-item failures for a run
    fn record_failures(&mut self, run_id: i64, failures: &[ItemFailure]) -> StorageResult<()>;

    /// Gets every failure recorded for a run, in insertion order
    fn failures_for_run(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>>;
}
