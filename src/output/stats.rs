//! Statistics generation from the snapshot database
//!
//! This module provides functionality for extracting and displaying
//! snapshot statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::PropgridError;

/// Snapshot statistics summary
#[derive(Debug, Clone)]
pub struct SnapshotStatistics {
    /// Number of runs recorded
    pub total_runs: u64,

    /// Listing rows across every snapshot day
    pub total_listings: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Listings per snapshot day, newest first
    pub per_snapshot: Vec<(String, u64)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(SnapshotStatistics)` - Successfully loaded statistics
/// * `Err(PropgridError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<SnapshotStatistics, PropgridError> {
    Ok(SnapshotStatistics {
        total_runs: storage.count_runs()?,
        total_listings: storage.count_listings()?,
        latest_run: storage.get_latest_run()?,
        per_snapshot: storage.listings_per_snapshot()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Snapshot Statistics ===\n");

    println!("Overview:");
    println!("  Runs recorded: {}", stats.total_runs);
    println!("  Listing rows stored: {}", stats.total_listings);
    println!("  Snapshot days: {}", stats.per_snapshot.len());
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run (#{}):", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        println!(
            "  Finished: {}",
            run.finished_at.as_deref().unwrap_or("(not finished)")
        );
        println!("  Pages fetched: {}", run.totals.pages_fetched);
        println!("  Raw rows: {}", run.totals.raw_rows);
        println!("  Listings: {}", run.totals.listings);
        if let Some(error) = &run.error {
            println!("  Error: {}", error);
        }
        println!();
    }

    if !stats.per_snapshot.is_empty() {
        println!("Listings by Snapshot:");
        for (day, count) in &stats.per_snapshot {
            println!("  {}: {}", day, count);
        }
    }
}
