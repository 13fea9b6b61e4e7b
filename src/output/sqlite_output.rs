//! SQLite-backed listing sink
//!
//! Each run writes into the snapshot of its ingestion day. Re-running on the
//! same day only adds listings that were not stored yet.

use crate::normalize::NormalizedListing;
use crate::output::traits::{ListingSink, OutputError, OutputResult};
use crate::storage::{RunStatus, RunTotals, Storage};
use chrono::NaiveDate;

/// Listing sink writing daily snapshots through a [`Storage`] backend
pub struct SnapshotSink<S: Storage> {
    storage: S,
    run_id: i64,
    snapshot_date: NaiveDate,
}

impl<S: Storage> SnapshotSink<S> {
    /// Opens a new run in `storage` and returns a sink bound to it
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `config_hash` - Hash of the configuration that drove the run
    /// * `snapshot_date` - Day the listings are filed under
    pub fn begin(mut storage: S, config_hash: &str, snapshot_date: NaiveDate) -> OutputResult<Self> {
        let run_id = storage
            .create_run(config_hash)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        tracing::info!("Recording run {} into snapshot {}", run_id, snapshot_date);

        Ok(Self {
            storage,
            run_id,
            snapshot_date,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn snapshot_date(&self) -> NaiveDate {
        self.snapshot_date
    }

    /// Releases the storage backend
    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: Storage> ListingSink for SnapshotSink<S> {
    fn write_listings(&mut self, listings: &[NormalizedListing]) -> OutputResult<usize> {
        let inserted = self
            .storage
            .insert_listings(self.run_id, self.snapshot_date, listings)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        if inserted < listings.len() {
            tracing::info!(
                "{} of {} listings were already in snapshot {}",
                listings.len() - inserted,
                listings.len(),
                self.snapshot_date
            );
        }

        Ok(inserted)
    }

    fn finalize(
        &mut self,
        status: RunStatus,
        totals: &RunTotals,
        error: Option<&str>,
    ) -> OutputResult<()> {
        self.storage
            .finish_run(self.run_id, status, totals, error)
            .map_err(|e| OutputError::Storage(e.to_string()))
    }
}
