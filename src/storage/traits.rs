//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::normalize::NormalizedListing;
use crate::storage::{RunRecord, RunStatus, RunTotals};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Listings are stored as daily snapshots: one row per
/// `(snapshot_date, property_id, address, posted)`. Writing the same listing
/// twice on one day leaves the first copy in place.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status, counters and error of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
        error: Option<&str>,
    ) -> StorageResult<()>;

    // ===== Listings =====

    /// Inserts listings into the snapshot for `snapshot_date`
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted; rows already present for that
    /// day are ignored.
    fn insert_listings(
        &mut self,
        run_id: i64,
        snapshot_date: NaiveDate,
        listings: &[NormalizedListing],
    ) -> StorageResult<usize>;

    /// Loads one day's snapshot, ordered by property id then address
    fn load_snapshot(&self, snapshot_date: NaiveDate) -> StorageResult<Vec<NormalizedListing>>;

    // ===== Statistics =====

    /// Total number of runs recorded
    fn count_runs(&self) -> StorageResult<u64>;

    /// Total number of stored listing rows across all snapshots
    fn count_listings(&self) -> StorageResult<u64>;

    /// Listing counts per snapshot day, newest first
    fn listings_per_snapshot(&self) -> StorageResult<Vec<(String, u64)>>;
}
