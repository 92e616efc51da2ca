use serde::Deserialize;

/// Main configuration structure for Event-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    pub notify: NotifyConfig,
}

/// The listing site being swept
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL that seed paths are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Listing path templates; `{page}` is required, `{start_date}` and
    /// `{end_date}` are optional
    #[serde(rename = "seed-paths")]
    pub seed_paths: Vec<String>,

    /// Number of pages requested for every seed path
    #[serde(rename = "max-pages-per-seed")]
    pub max_pages_per_seed: u32,

    /// Length of the rolling date window, in days from today
    #[serde(rename = "window-days", default = "default_window_days")]
    pub window_days: u32,
}

/// Page fetching behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per page, including the first one
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Backoff base delay (milliseconds), doubled after every failed attempt
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to each backoff
    #[serde(rename = "backoff-jitter-ms", default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,

    /// Lower bound of the pause between page attempts (milliseconds)
    #[serde(rename = "politeness-min-ms", default = "default_politeness_min_ms")]
    pub politeness_min_ms: u64,

    /// Upper bound of the pause between page attempts (milliseconds)
    #[serde(rename = "politeness-max-ms", default = "default_politeness_max_ms")]
    pub politeness_max_ms: u64,

    /// Number of pages fetched at once
    #[serde(
        rename = "max-concurrent-fetches",
        default = "default_max_concurrent_fetches"
    )]
    pub max_concurrent_fetches: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            politeness_min_ms: default_politeness_min_ms(),
            politeness_max_ms: default_politeness_max_ms(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
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

    /// Value sent as the Accept-Language header
    #[serde(rename = "accept-language", default)]
    pub accept_language: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!(
            "Mozilla/5.0 (compatible; {}/{})",
            self.crawler_name, self.crawler_version
        )
    }
}

/// Persistent identifier store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Table holding one row per event identifier
    #[serde(default = "default_table")]
    pub table: String,
}

/// Downstream notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Base URL of the downstream service
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "timeout-secs", default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_window_days() -> u32 {
    14
}

fn default_timeout_secs() -> u64 {
    40
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    800
}

fn default_backoff_jitter_ms() -> u64 {
    400
}

fn default_politeness_min_ms() -> u64 {
    50
}

fn default_politeness_max_ms() -> u64 {
    150
}

fn default_max_concurrent_fetches() -> u32 {
    1
}

fn default_table() -> String {
    "event_ids".to_string()
}

fn default_notify_timeout_secs() -> u64 {
    30
}
