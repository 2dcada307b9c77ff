//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the run ledger.

/// Ledger tables: runs and the item failures recorded against them
pub const SCHEMA_SQL: &str = r#"
-- One row per harvest or reprocess run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    categories_count INTEGER NOT NULL DEFAULT 0,
    series_count INTEGER NOT NULL DEFAULT 0,
    products_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    duration_seconds REAL,
    error_message TEXT
);

-- Per-item failures recorded during a run
CREATE TABLE IF NOT EXISTS item_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    phase TEXT NOT NULL,
    subject TEXT NOT NULL,
    message TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_item_failures_run ON item_failures(run_id);
"#;

/// Creates the ledger tables when missing
///
/// Safe to run on every open.
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
