//! Run statistics
//!
//! Counts are produced by the coordinator from stage results; nothing in
//! here is updated concurrently.

use serde::Serialize;

/// Summary of one harvest run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    /// Number of category URLs the run was given
    pub categories_count: usize,

    /// Number of series selected for product extraction
    pub series_count: usize,

    /// Number of product stubs listed across the selected series
    pub products_count: usize,

    /// Number of products that reached persistence
    pub success_count: usize,

    /// `products_count - success_count`
    pub error_count: usize,

    /// Wall-clock duration of the run
    pub duration_seconds: f64,
}

impl RunStats {
    /// Sets the success count and derives the error count from it
    pub fn settle(&mut self, success_count: usize) {
        self.success_count = success_count;
        self.error_count = self.products_count.saturating_sub(success_count);
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.products_count == 0 {
            return 0.0;
        }
        (self.success_count as f64 / self.products_count as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_run_stats(stats: &RunStats) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Categories: {}", stats.categories_count);
    println!("  Series: {}", stats.series_count);
    println!("  Products listed: {}", stats.products_count);
    println!("  Products saved: {}", stats.success_count);
    println!("  Products failed: {}", stats.error_count);
    println!("  Duration: {:.1}s", stats.duration_seconds);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} products saved)",
        stats.success_rate(),
        stats.success_count,
        stats.products_count
    );
}
