//! HTTP request executor
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building an HTTP client with a proper user agent and a cookie store
//! - GET requests for the entry page and artifacts
//! - Form-encoded POST requests for postbacks
//! - Bounded retry with exponential backoff
//!
//! The executor owns no parsing logic. The cookie store is the only state it
//! keeps, and it must live for the whole crawl because the grid ties its
//! pagination state to the session.

use crate::config::{RetryConfig, UserAgentConfig};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;

/// A request the executor can send
///
/// A POST always carries a form body, so there is no way to build one without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequest {
    /// Plain GET
    Get { url: String },

    /// Form-encoded POST
    Post {
        url: String,
        form: Vec<(String, String)>,
    },
}

impl HttpRequest {
    /// Builds a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::Get { url: url.into() }
    }

    /// Builds a form POST request
    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self::Post {
            url: url.into(),
            form,
        }
    }

    /// Target URL of the request
    pub fn url(&self) -> &str {
        match self {
            Self::Get { url } | Self::Post { url, .. } => url,
        }
    }

    /// HTTP method name, for logs and errors
    pub fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Post { .. } => "POST",
        }
    }
}

/// A successful response with its body read
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Errors surfaced by the executor
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{method} {url} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        method: &'static str,
        url: String,
        attempts: u32,
        last_error: String,
    },
}

/// Why a single attempt failed
#[derive(Debug)]
enum AttemptError {
    Status(u16),
    Transport(String),
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Transport(error) => write!(f, "{}", error),
        }
    }
}

/// Attempt ceiling and backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,

    /// Wait after the first failure
    pub min_backoff: Duration,

    /// Upper bound on any single wait
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_backoff: Duration::from_millis(config.backoff_min_ms),
            max_backoff: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt number `attempt` (1-based)
    ///
    /// Doubles from `min_backoff` and is clamped to `[min_backoff, max_backoff]`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let max = self.max_backoff.max(self.min_backoff);
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_backoff
            .saturating_mul(factor)
            .clamp(self.min_backoff, max)
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client keeps cookies across requests; the grid's session cookie is what
/// ties a postback to the view-state it echoes.
///
/// # Example
///
/// ```no_run
/// use propgrid::config::UserAgentConfig;
/// use propgrid::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "IO-Listings".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "contact@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends requests with bounded retry
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | 2xx | Return the page |
/// | Any other status | Retry with backoff |
/// | Timeout, connection or body read error | Retry with backoff |
/// | Attempts exhausted | [`FetchError::Exhausted`] |
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    policy: RetryPolicy,
}

impl RequestExecutor {
    /// Creates an executor around an existing client
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds the client from config and wraps it
    pub fn from_config(
        user_agent: &UserAgentConfig,
        retry: &RetryConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent)?, RetryPolicy::from(retry)))
    }

    /// The retry policy in force
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes a request, retrying transient failures
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - A 2xx response with its body
    /// * `Err(FetchError)` - Every attempt failed
    pub async fn execute(&self, request: &HttpRequest) -> Result<FetchedPage, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(request).await {
                Ok(page) => {
                    if attempt > 1 {
                        tracing::debug!(
                            "{} {} succeeded on attempt {}",
                            request.method(),
                            request.url(),
                            attempt
                        );
                    }
                    return Ok(page);
                }
                Err(error) => {
                    last_error = error.to_string();

                    if attempt < max_attempts {
                        let wait = self.policy.backoff_after(attempt);
                        tracing::warn!(
                            "{} {} failed (attempt {}/{}): {}; retrying in {:?}",
                            request.method(),
                            request.url(),
                            attempt,
                            max_attempts,
                            error,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        tracing::error!(
            "{} {} failed after {} attempt(s): {}",
            request.method(),
            request.url(),
            max_attempts,
            last_error
        );

        Err(FetchError::Exhausted {
            method: request.method(),
            url: request.url().to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    /// One send-and-read cycle
    async fn attempt(&self, request: &HttpRequest) -> Result<FetchedPage, AttemptError> {
        let builder = match request {
            HttpRequest::Get { url } => self.client.get(url),
            HttpRequest::Post { url, form } => self.client.post(url).form(form),
        };

        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response.bytes().await.map_err(classify_error)?;

        Ok(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

/// Maps a transport error onto a short description
fn classify_error(error: reqwest::Error) -> AttemptError {
    if error.is_timeout() {
        AttemptError::Transport("Request timeout".to_string())
    } else if error.is_connect() {
        AttemptError::Transport(format!("Connection failed: {}", error))
    } else {
        AttemptError::Transport(error.to_string())
    }
}
