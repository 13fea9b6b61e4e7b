//! Output module for persisting crawl results
//!
//! This module handles:
//! - Writing listings to daily snapshots
//! - Downloading per-listing map artifacts
//! - Reporting snapshot statistics

mod artifacts;
mod sqlite_output;
pub mod stats;
mod traits;

pub use artifacts::{ArtifactDownloader, DownloadSummary};
pub use sqlite_output::SnapshotSink;
pub use stats::{load_statistics, print_statistics, SnapshotStatistics};
pub use traits::{ListingSink, OutputError, OutputResult};

use crate::crawler::CrawlReport;
use crate::storage::{RunStatus, RunTotals};

/// Status a finished crawl is recorded with
pub fn run_status(report: &CrawlReport) -> RunStatus {
    if report.is_partial() {
        RunStatus::Partial
    } else {
        RunStatus::Completed
    }
}

/// Counters a finished crawl is recorded with
pub fn run_totals(report: &CrawlReport) -> RunTotals {
    RunTotals {
        pages_fetched: report.pages_fetched as u64,
        raw_rows: report.raw_row_count as u64,
        listings: report.listings.len() as u64,
    }
}

/// Writes a report's listings to `sink` and finalizes the run
///
/// Partial reports are stored like complete ones and finalized as
/// [`RunStatus::Partial`] with the fetch error attached.
///
/// # Returns
///
/// * `Ok(usize)` - Listings newly stored
/// * `Err(OutputError)` - The sink rejected the write
pub fn store_report(sink: &mut dyn ListingSink, report: &CrawlReport) -> OutputResult<usize> {
    let inserted = sink.write_listings(&report.listings)?;
    let error = report.error.as_ref().map(|e| e.to_string());
    sink.finalize(run_status(report), &run_totals(report), error.as_deref())?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchError;
    use crate::normalize::NormalizedListing;
    use chrono::Utc;

    #[derive(Default)]
    struct RecordingSink {
        written: usize,
        finalized: Option<(RunStatus, RunTotals, Option<String>)>,
    }

    impl ListingSink for RecordingSink {
        fn write_listings(&mut self, listings: &[NormalizedListing]) -> OutputResult<usize> {
            self.written += listings.len();
            Ok(listings.len())
        }

        fn finalize(
            &mut self,
            status: RunStatus,
            totals: &RunTotals,
            error: Option<&str>,
        ) -> OutputResult<()> {
            self.finalized = Some((status, *totals, error.map(str::to_string)));
            Ok(())
        }
    }

    fn report(error: Option<FetchError>) -> CrawlReport {
        CrawlReport {
            listings: Vec::new(),
            raw_row_count: 5,
            pages_fetched: 3,
            aggregate_used: false,
            reported_total: Some(5),
            ingested_at: Utc::now(),
            error,
        }
    }

    #[test]
    fn test_store_complete_report() {
        let mut sink = RecordingSink::default();
        store_report(&mut sink, &report(None)).unwrap();

        let (status, totals, error) = sink.finalized.unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(totals.pages_fetched, 3);
        assert_eq!(totals.raw_rows, 5);
        assert_eq!(error, None);
    }

    #[test]
    fn test_store_partial_report() {
        let mut sink = RecordingSink::default();
        let error = FetchError::Exhausted {
            method: "POST",
            url: "https://grid.example.com/Home.aspx".to_string(),
            attempts: 3,
            last_error: "HTTP 503".to_string(),
        };
        store_report(&mut sink, &report(Some(error))).unwrap();

        let (status, _, error) = sink.finalized.unwrap();
        assert_eq!(status, RunStatus::Partial);
        assert!(error.unwrap().contains("HTTP 503"));
    }
}
