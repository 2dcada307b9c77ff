//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RunLedger trait.

use crate::model::ItemFailure;
use crate::output::RunStats;
use crate::state::RunPhase;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RunLedger, StorageError, StorageResult};
use crate::storage::{FailureRecord, LedgerStatus, RunMode, RunRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, mode, started_at, finished_at, config_hash, status, \
     categories_count, series_count, products_count, success_count, error_count, \
     duration_seconds, error_message";

/// SQLite ledger backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        mode: RunMode::from_db_string(&row.get::<_, String>(1)?).unwrap_or(RunMode::Harvest),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: LedgerStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(LedgerStatus::Running),
        categories_count: count(row.get(6)?),
        series_count: count(row.get(7)?),
        products_count: count(row.get(8)?),
        success_count: count(row.get(9)?),
        error_count: count(row.get(10)?),
        duration_seconds: row.get(11)?,
        error_message: row.get(12)?,
    })
}

impl RunLedger for SqliteStorage {
    // ===== Run Management =====

    fn start_run(&mut self, mode: RunMode, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                mode.to_db_string(),
                now,
                config_hash,
                LedgerStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: LedgerStatus,
        stats: &RunStats,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, categories_count = ?3,
                series_count = ?4, products_count = ?5, success_count = ?6,
                error_count = ?7, duration_seconds = ?8, error_message = ?9
             WHERE id = ?10",
            params![
                status.to_db_string(),
                now,
                stats.categories_count as i64,
                stats.series_count as i64,
                stats.products_count as i64,
                stats.success_count as i64,
                stats.error_count as i64,
                stats.duration_seconds,
                error,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], run_from_row)?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }

        Ok(runs)
    }

    // ===== Failure Tracking =====

    fn record_failures(&mut self, run_id: i64, failures: &[ItemFailure]) -> StorageResult<()> {
        if failures.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO item_failures (run_id, phase, subject, message, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for failure in failures {
                stmt.execute(params![
                    run_id,
                    failure.phase.to_db_string(),
                    failure.subject,
                    failure.message,
                    now
                ])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn failures_for_run(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, phase, subject, message, recorded_at
             FROM item_failures WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok(FailureRecord {
                run_id: row.get(0)?,
                phase: RunPhase::from_db_string(&row.get::<_, String>(1)?)
                    .unwrap_or(RunPhase::Failed),
                subject: row.get(2)?,
                message: row.get(3)?,
                recorded_at: row.get(4)?,
            })
        })?;

        let mut failures = Vec::new();
        for row in rows {
            failures.push(row?);
        }

        Ok(failures)
    }
}
