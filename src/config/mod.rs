//! Configuration module for propgrid
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use propgrid::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("propgrid.toml")).unwrap();
//! println!("Crawl starts at: {}", config.crawler.entry_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, EndpointConfig, OutputConfig, PageSize, RetryConfig, TableConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
