//! State module for tracking run progress
//!
//! This module provides the run-level state machine and the status channel a
//! polling front-end can read from.
//!
//! # Components
//!
//! - `RunPhase`: The stage a run is currently in (series, products, details, ...)
//! - `RunStatus`: Coarse progress snapshot (running flag, percent, label, error)
//! - `StatusReporter` / `StatusHandle`: The coordinator-owned writer and the
//!   read-only handle given to observers

mod run_phase;
mod status;

// Re-export main types
pub use run_phase::RunPhase;
pub use status::{RunStatus, StatusHandle, StatusReporter};
