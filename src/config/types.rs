use serde::Deserialize;
use std::fmt;

/// Main configuration structure for propgrid
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawl traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// The grid page every crawl starts from
    #[serde(rename = "entry-url")]
    pub entry_url: String,

    /// Requested page size. Informational: the aggregate page is always tried first.
    #[serde(rename = "page-size", default)]
    pub page_size: PageSize,

    /// Delay before every numbered-page postback (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Upper bound on numbered-page postbacks in one run
    ///
    /// The entry page and the aggregate attempt are not counted.
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Overall wall-clock budget for one crawl (seconds)
    #[serde(rename = "run-timeout-secs", default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

/// Page-size hint accepted by the grid's page-size selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PageSize {
    #[serde(rename = "50")]
    Fifty,
    #[serde(rename = "100")]
    Hundred,
    #[serde(rename = "150")]
    HundredFifty,
    #[default]
    #[serde(rename = "all", alias = "All", alias = "ALL")]
    All,
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fifty => "50",
            Self::Hundred => "100",
            Self::HundredFifty => "150",
            Self::All => "all",
        };
        write!(f, "{}", s)
    }
}

/// Retry and backoff bounds for every request
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, first try included
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Shortest wait between attempts (milliseconds)
    #[serde(rename = "backoff-min-ms", default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,

    /// Longest wait between attempts (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Fixed-origin endpoints used to resolve relative links
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Scheme and host, e.g. `https://apps.infrastructureontario.ca`
    pub origin: String,

    /// Endpoint that bare `Details` query fragments are appended to
    pub details: String,

    /// Endpoint that bare `Image` (map) query fragments are appended to
    pub image: String,
}

/// How the results table is located and keyed
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    /// Case-insensitive regex matched against `<table id>`
    #[serde(rename = "id-pattern", default = "default_id_pattern")]
    pub id_pattern: String,

    /// Header text whose presence marks the results table
    #[serde(rename = "marker-column", default = "default_marker_column")]
    pub marker_column: String,

    /// Header of the numeric identifier column
    #[serde(rename = "id-column", default = "default_id_column")]
    pub id_column: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            id_pattern: default_id_pattern(),
            marker_column: default_marker_column(),
            id_column: default_id_column(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite snapshot database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory that map artifacts are written into
    #[serde(rename = "images-dir", default = "default_images_dir")]
    pub images_dir: String,

    /// Whether to download map artifacts after a crawl
    #[serde(rename = "download-images", default)]
    pub download_images: bool,

    /// Maximum artifacts considered per run
    #[serde(rename = "image-limit", default = "default_image_limit")]
    pub image_limit: usize,
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_max_pages() -> u32 {
    100
}

fn default_run_timeout_secs() -> u64 {
    900
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_min_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    8000
}

fn default_id_pattern() -> String {
    "gvPropertyList".to_string()
}

fn default_marker_column() -> String {
    "Municipal Address".to_string()
}

fn default_id_column() -> String {
    "ID".to_string()
}

fn default_images_dir() -> String {
    "data/raw/images".to_string()
}

fn default_image_limit() -> usize {
    10
}
