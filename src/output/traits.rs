//! Output sink traits and error types
//!
//! This module defines the trait interface for listing sinks and
//! associated error types.

use crate::normalize::NormalizedListing;
use crate::storage::{RunStatus, RunTotals};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for the listings of one crawl run
///
/// A sink receives the normalized listings once, then is finalized with the
/// run's outcome. Implementations decide how repeated listings are merged.
pub trait ListingSink {
    /// Writes listings to the sink
    ///
    /// # Returns
    ///
    /// The number of listings newly stored
    fn write_listings(&mut self, listings: &[NormalizedListing]) -> OutputResult<usize>;

    /// Finalizes the run, recording its status, counters and error
    ///
    /// # Arguments
    ///
    /// * `status` - The final status of the crawl run
    /// * `totals` - Pages, raw rows and listings of the run
    /// * `error` - Why the run stopped early, if it did
    fn finalize(
        &mut self,
        status: RunStatus,
        totals: &RunTotals,
        error: Option<&str>,
    ) -> OutputResult<()>;
}
