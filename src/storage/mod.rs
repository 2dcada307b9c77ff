//! Storage module for the run ledger
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - One row per run with its status and final statistics
//! - Per-item failures recorded during a run

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{RunLedger, StorageError, StorageResult};

use crate::state::RunPhase;
use std::path::Path;

/// Initializes or opens a ledger database
///
/// The parent directory is created when missing.
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}

/// Represents a run in the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub mode: RunMode,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: LedgerStatus,
    pub categories_count: u64,
    pub series_count: u64,
    pub products_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}

/// Represents a per-item failure in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub run_id: i64,
    pub phase: RunPhase,
    pub subject: String,
    pub message: String,
    pub recorded_at: String,
}

/// What kind of run a ledger row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full extraction from category URLs
    Harvest,
    /// Enrichment and persistence over a previous export
    Reprocess,
}

impl RunMode {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Harvest => "harvest",
            Self::Reprocess => "reprocess",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "harvest" => Some(Self::Harvest),
            "reprocess" => Some(Self::Reprocess),
            _ => None,
        }
    }
}

/// Status of a run in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl LedgerStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
