//! Crawler coordinator - main crawl orchestration logic
//!
//! One crawl is a single sequential conversation with the grid:
//! - Fetch the entry page and capture its form state
//! - Fire the "All" control if the pager offers one
//! - Walk the numbered pages, re-reading form state from every response
//! - Hand the accumulated rows to the normalizer
//!
//! Parsed documents are not `Send`, so every response body is reduced to an
//! owned [`PageDigest`] before the next await point.

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, HttpRequest, RequestExecutor};
use crate::crawler::form_state::{extract_form_state, FormState};
use crate::crawler::planner::{plan, reported_total_records, PageQueue, TraversalPlan};
use crate::crawler::table::{RawRow, TableExtractor};
use crate::document::HtmlDocument;
use crate::normalize::{ingestion_timestamp, normalize_rows, NormalizedListing};
use crate::url::LinkResolver;
use crate::PropgridError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

/// Everything the crawl needs from one response
#[derive(Debug, Clone, Default)]
pub struct PageDigest {
    /// Hidden fields for the next postback
    pub state: FormState,

    /// Navigation controls the page offers
    pub plan: TraversalPlan,

    /// Valid rows of the results table
    pub rows: Vec<RawRow>,

    /// `Total Records: N`, when displayed
    pub reported_total: Option<u64>,
}

/// Outcome of a crawl
///
/// A report with an `error` is partial: the rows gathered before the failure
/// are still present and normalized.
#[derive(Debug)]
pub struct CrawlReport {
    /// Deduplicated listings in first-seen order
    pub listings: Vec<NormalizedListing>,

    /// Rows extracted across all pages, before deduplication
    pub raw_row_count: usize,

    /// Successful responses, entry page included
    pub pages_fetched: usize,

    /// Whether the rows came from the "All" page
    pub aggregate_used: bool,

    /// Record count displayed by the grid, if any
    pub reported_total: Option<u64>,

    /// Shared ingestion stamp of every listing
    pub ingested_at: DateTime<Utc>,

    /// The fetch failure that cut the crawl short
    pub error: Option<FetchError>,
}

impl CrawlReport {
    /// True when a page fetch failed after the entry page
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    executor: RequestExecutor,
    extractor: TableExtractor,
    resolver: LinkResolver,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(PropgridError)` - Client, table pattern or endpoints were unusable
    pub fn new(config: Config) -> Result<Self, PropgridError> {
        let executor = RequestExecutor::from_config(&config.user_agent, &config.retry)?;
        Self::with_executor(config, executor)
    }

    /// Creates a coordinator around an existing executor
    pub fn with_executor(config: Config, executor: RequestExecutor) -> Result<Self, PropgridError> {
        let extractor = TableExtractor::from_config(&config.table)?;
        let resolver = LinkResolver::from_config(&config.crawler, &config.endpoints)?;

        Ok(Self {
            config,
            executor,
            extractor,
            resolver,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The request executor, for follow-up fetches sharing the session cookies
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    /// Parses a response body and keeps what the crawl needs
    pub fn digest(&self, body: &str) -> PageDigest {
        let doc = HtmlDocument::parse(body);
        PageDigest {
            state: extract_form_state(&doc),
            plan: plan(&doc),
            rows: self.extractor.extract(&doc),
            reported_total: reported_total_records(&doc),
        }
    }

    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Rows were gathered; check [`CrawlReport::is_partial`]
    /// * `Err(PropgridError)` - The entry page could not be fetched
    pub async fn run(&self) -> Result<CrawlReport, PropgridError> {
        let entry_url = self.config.crawler.entry_url.as_str();
        let ingested_at = ingestion_timestamp(Utc::now());
        let start_time = std::time::Instant::now();

        tracing::info!(
            "Starting crawl of {} (page size hint: {})",
            entry_url,
            self.config.crawler.page_size
        );

        let entry = self.executor.execute(&HttpRequest::get(entry_url)).await?;
        let mut pages_fetched = 1;
        let mut current = self.digest(&entry.text());
        let mut reported_total = current.reported_total;

        tracing::info!(
            "Entry page: {} rows, {} navigation controls, {} state fields",
            current.rows.len(),
            current.plan.ordered().len(),
            current.state.len()
        );
        if current.state.is_empty() {
            tracing::warn!("Entry page carries no view-state; postbacks may be rejected");
        }
        if current.plan.is_terminal() {
            tracing::debug!("Entry page has no pager; single page grid");
        }

        let mut rows = std::mem::take(&mut current.rows);
        let mut state = current.state;
        let mut queue = PageQueue::new();
        let mut aggregate_used = false;

        if let Some(all) = current.plan.aggregate.as_ref() {
            tracing::info!("Requesting aggregate page via {}", all.argument);
            let request = HttpRequest::post(entry_url, state.postback_form(all));

            match self.executor.execute(&request).await {
                Ok(page) => {
                    pages_fetched += 1;
                    let digest = self.digest(&page.text());
                    if digest.rows.is_empty() {
                        tracing::warn!(
                            "Aggregate page returned no rows; continuing from the entry page"
                        );
                    } else {
                        tracing::info!("Aggregate page: {} rows", digest.rows.len());
                        reported_total = digest.reported_total.or(reported_total);
                        rows = digest.rows;
                        aggregate_used = true;
                    }
                    // Tokens rotate on every response, rows or not
                    state = digest.state;
                    queue.offer(&digest.plan.numbered);
                }
                Err(e) => {
                    tracing::warn!("Aggregate request failed, falling back to paging: {}", e);
                }
            }
        } else {
            tracing::debug!("No aggregate control on entry page");
        }

        if !aggregate_used {
            queue.offer(&current.plan.numbered);
        }

        let delay = Duration::from_millis(self.config.crawler.request_delay_ms);
        let max_pages = self.config.crawler.max_pages;
        let mut fallback_pages = 0;
        let mut error = None;

        while let Some((number, target)) = queue.next_page() {
            if fallback_pages >= max_pages {
                tracing::warn!(
                    "Reached max-pages limit ({}); {} page(s) left unvisited",
                    max_pages,
                    queue.len() + 1
                );
                break;
            }

            tokio::time::sleep(delay).await;

            let request = HttpRequest::post(entry_url, state.postback_form(&target));
            let page = match self.executor.execute(&request).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Stopping at page {}: {}", number, e);
                    error = Some(e);
                    break;
                }
            };

            pages_fetched += 1;
            fallback_pages += 1;

            let digest = self.digest(&page.text());
            let discovered = queue.offer(&digest.plan.numbered);
            tracing::info!(
                "Page {}: {} rows, {} new page(s) discovered",
                number,
                digest.rows.len(),
                discovered
            );

            rows.extend(digest.rows);
            state = digest.state;
            reported_total = reported_total.or(digest.reported_total);
        }

        let listings = normalize_rows(&rows, &self.resolver, ingested_at);
        log_completeness(&listings, reported_total);

        tracing::info!(
            "Crawl finished: {} pages, {} raw rows, {} listings in {:?}",
            pages_fetched,
            rows.len(),
            listings.len(),
            start_time.elapsed()
        );

        Ok(CrawlReport {
            listings,
            raw_row_count: rows.len(),
            pages_fetched,
            aggregate_used,
            reported_total,
            ingested_at,
            error,
        })
    }
}

/// Compares the grid's own record count with what was gathered
fn log_completeness(listings: &[NormalizedListing], reported_total: Option<u64>) {
    let unique_ids: HashSet<&str> = listings.iter().map(|l| l.property_id.as_str()).collect();

    match reported_total {
        Some(total) if total == unique_ids.len() as u64 => {
            tracing::info!("Collected all {} records reported by the grid", total);
        }
        Some(total) => {
            tracing::warn!(
                "Grid reports {} records but {} unique ids were collected",
                total,
                unique_ids.len()
            );
        }
        None => {
            tracing::debug!("Grid does not report a record total");
        }
    }
}

/// Runs the main crawl operation
///
/// # Example
///
/// ```no_run
/// use propgrid::config::load_config;
/// use propgrid::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = run_crawl(config).await?;
/// println!("{} listings", report.listings.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlReport, PropgridError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
