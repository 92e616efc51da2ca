//! HTTP fetcher implementation
//!
//! This module handles all listing page requests for the sweep, including:
//! - Building the shared HTTP client with user agent and language headers
//! - GET requests that follow redirects
//! - Retry with exponential backoff and jitter for transient failures
//! - Error classification

use crate::config::{FetchConfig, UserAgentConfig};
use crate::SweepError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Fetched {
        /// Page body content
        body: String,
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status_code: u16,
    },

    /// The page could not be fetched; carries the URL that was requested
    Failed {
        url: Url,
        /// Number of attempts made
        attempts: u32,
        /// Description of the last error
        reason: String,
    },
}

impl FetchResult {
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }
}

/// Backoff schedule between attempts
///
/// After failed attempt `i` (0-indexed) the fetcher sleeps
/// `base_delay * 2^i + U[0, max_jitter)` before trying again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            attempts: config.retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_jitter: Duration::from_millis(config.backoff_jitter_ms),
        }
    }

    /// Deterministic part of the delay after attempt `attempt`
    pub fn backoff_floor(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay to sleep after failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_floor(attempt).saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..max_ms))
        }
    }
}

/// Returns true for statuses that indicate rate limiting or a server hiccup
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Outcome of a single failed attempt
#[derive(Debug)]
enum AttemptError {
    Retryable(String),
    Fatal(String),
}

/// Source of listing page content
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, retrying as configured; never returns an error
    async fn fetch(&self, url: &Url) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `fetch` - Timeout settings
/// * `user_agent` - User agent and language headers
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    fetch: &FetchConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Some(language) = &user_agent.accept_language {
        match HeaderValue::from_str(language) {
            Ok(value) => {
                headers.insert(ACCEPT_LANGUAGE, value);
            }
            Err(_) => tracing::warn!("Ignoring invalid accept-language '{}'", language),
        }
    }

    let timeout = Duration::from_secs(fetch.timeout_secs);

    Client::builder()
        .user_agent(user_agent.header_value())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher that owns the run's HTTP client
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher from the `[fetch]` and `[user-agent]` sections
    pub fn new(fetch: &FetchConfig, user_agent: &UserAgentConfig) -> Result<Self, SweepError> {
        let client = build_http_client(fetch, user_agent)?;
        Ok(Self::with_client(client, RetryPolicy::from_config(fetch)))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Makes one GET request and classifies any failure
    async fn attempt(&self, url: &Url) -> Result<(String, Url, u16), AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(describe_transport_error(&e)))?;

        let status = response.status();
        if is_retryable_status(status) {
            return Err(AttemptError::Retryable(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Retryable(format!("Failed to read body: {}", e)))?;

        Ok((body, final_url, status.as_u16()))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.attempt(url).await {
                Ok((body, final_url, status_code)) => {
                    return FetchResult::Fetched {
                        body,
                        final_url,
                        status_code,
                    };
                }
                Err(AttemptError::Fatal(reason)) => {
                    tracing::warn!("Not retrying {}: {}", url, reason);
                    return FetchResult::Failed {
                        url: url.clone(),
                        attempts: attempt + 1,
                        reason,
                    };
                }
                Err(AttemptError::Retryable(reason)) => {
                    if attempt + 1 < attempts {
                        let delay = self.policy.delay_for(attempt);
                        tracing::debug!(
                            "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                            attempt + 1,
                            attempts,
                            url,
                            reason,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = reason;
                }
            }
        }

        tracing::warn!(
            "Giving up on {} after {} attempts: {}",
            url,
            attempts,
            last_error
        );

        FetchResult::Failed {
            url: url.clone(),
            attempts,
            reason: last_error,
        }
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    }
}
