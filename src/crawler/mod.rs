//! Crawler module for postback-driven grids
//!
//! This module contains the core crawling logic, including:
//! - HTTP execution with retry and backoff
//! - Hidden form-state capture
//! - Pagination planning
//! - Results-table extraction
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod form_state;
mod planner;
mod table;

pub use coordinator::{run_crawl, Coordinator, CrawlReport, PageDigest};
pub use fetcher::{
    build_http_client, FetchError, FetchedPage, HttpRequest, RequestExecutor, RetryPolicy,
};
pub use form_state::{
    extract_form_state, FormState, EVENT_ARGUMENT, EVENT_TARGET, EVENT_VALIDATION, VIEWSTATE,
    VIEWSTATE_GENERATOR,
};
pub use planner::{
    aggregate_target, find_postback_targets, numbered_targets, plan, reported_total_records,
    PageQueue, PaginationTarget, TraversalPlan,
};
pub use table::{columns, is_numeric_id, RawRow, TableExtractor};

use crate::config::Config;
use crate::PropgridError;
use std::time::Duration;

/// Runs a complete crawl under the configured run timeout
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client, table extractor and link resolver
/// 2. Fetch the entry page
/// 3. Try the aggregate page, then walk numbered pages
/// 4. Normalize everything gathered
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished, possibly partial
/// * `Err(PropgridError)` - Entry page failed, or the run timed out
pub async fn crawl(config: Config) -> Result<CrawlReport, PropgridError> {
    let coordinator = Coordinator::new(config)?;
    crawl_with(&coordinator).await
}

/// Runs an already built coordinator under its configured run timeout
///
/// Keeps the coordinator (and its cookie session) available afterwards for
/// follow-up requests such as artifact downloads.
pub async fn crawl_with(coordinator: &Coordinator) -> Result<CrawlReport, PropgridError> {
    let seconds = coordinator.config().crawler.run_timeout_secs;
    match tokio::time::timeout(Duration::from_secs(seconds), coordinator.run()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Crawl exceeded run timeout of {}s", seconds);
            Err(PropgridError::Timeout { seconds })
        }
    }
}
