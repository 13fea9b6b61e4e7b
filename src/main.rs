//! propgrid main entry point
//!
//! This is the command-line interface for the propgrid listings crawler.

use anyhow::{bail, Context};
use clap::Parser;
use propgrid::config::{load_config_with_hash, Config};
use propgrid::crawler::{crawl_with, Coordinator};
use propgrid::output::{
    load_statistics, print_statistics, store_report, ArtifactDownloader, SnapshotSink,
};
use propgrid::storage::{RunStatus, RunTotals, SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// propgrid: a crawler for postback-paginated listing grids
///
/// propgrid walks a server-rendered results grid, following its view-state
/// driven pager, and stores the listings it finds as a daily snapshot.
#[derive(Parser, Debug)]
#[command(name = "propgrid")]
#[command(version)]
#[command(about = "A crawler for postback-paginated listing grids", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Download map PDFs after the crawl, overriding the config
    #[arg(long)]
    download_images: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.download_images {
        config.output.download_images = true;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("propgrid=info,warn"),
            1 => EnvFilter::new("propgrid=debug,info"),
            2 => EnvFilter::new("propgrid=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== propgrid Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Entry URL: {}", config.crawler.entry_url);
    println!("  Page size hint: {}", config.crawler.page_size);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Max fallback pages: {}", config.crawler.max_pages);
    println!("  Run timeout: {}s", config.crawler.run_timeout_secs);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms .. {}ms",
        config.retry.backoff_min_ms, config.retry.backoff_max_ms
    );

    println!("\nEndpoints:");
    println!("  Origin: {}", config.endpoints.origin);
    println!("  Details: {}", config.endpoints.details);
    println!("  Image: {}", config.endpoints.image);

    println!("\nResults Table:");
    println!("  Id pattern: {}", config.table.id_pattern);
    println!("  Marker column: {}", config.table.marker_column);
    println!("  Id column: {}", config.table.id_column);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if config.output.download_images {
        println!(
            "  Images: {} (limit {})",
            config.output.images_dir, config.output.image_limit
        );
    } else {
        println!("  Images: disabled");
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let database_path = PathBuf::from(&config.output.database_path);
    let coordinator = Coordinator::new(config)?;

    let report = match crawl_with(&coordinator).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            record_failed_run(&database_path, config_hash, &e.to_string());
            return Err(e.into());
        }
    };

    let storage = SqliteStorage::new(&database_path).context("failed to open database")?;
    let mut sink = SnapshotSink::begin(storage, config_hash, report.ingested_at.date_naive())?;
    let inserted = store_report(&mut sink, &report)?;

    println!(
        "Stored {} new of {} listings ({} raw rows, {} pages) in snapshot {}",
        inserted,
        report.listings.len(),
        report.raw_row_count,
        report.pages_fetched,
        sink.snapshot_date()
    );
    if let Some(total) = report.reported_total {
        println!("Grid reports {} total records", total);
    }

    let output = &coordinator.config().output;
    if output.download_images {
        let downloader = ArtifactDownloader::new(
            coordinator.executor(),
            &output.images_dir,
            output.image_limit,
            Duration::from_millis(coordinator.config().crawler.request_delay_ms),
        );
        let summary = downloader.download_all(&report.listings).await?;
        println!(
            "Images: {} downloaded, {} already present, {} failed",
            summary.downloaded, summary.skipped_existing, summary.failed
        );
    }

    if let Some(error) = &report.error {
        bail!("crawl was partial: {}", error);
    }

    tracing::info!("Crawl completed successfully");
    Ok(())
}

/// Records a run that produced nothing; failures here are only logged
fn record_failed_run(database_path: &Path, config_hash: &str, error: &str) {
    let result = SqliteStorage::new(database_path).and_then(|mut storage| {
        let run_id = storage.create_run(config_hash)?;
        storage.finish_run(run_id, RunStatus::Failed, &RunTotals::default(), Some(error))?;
        Ok(())
    });

    if let Err(e) = result {
        tracing::warn!("Could not record failed run: {}", e);
    }
}
