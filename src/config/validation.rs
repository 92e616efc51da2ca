use crate::config::types::{
    Config, FetchConfig, NotifyConfig, SiteConfig, StorageConfig, UserAgentConfig,
};
use crate::crawler::SeedTemplate;
use crate::ConfigError;
use url::Url;

/// Upper bound for `max-concurrent-fetches`
const MAX_CONCURRENT_FETCHES: u32 = 8;

/// Upper bound for `window-days`
const MAX_WINDOW_DAYS: u32 = 366;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_fetch_config(&config.fetch)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_notify_config(&config.notify)?;
    Ok(())
}

/// Validates the listing site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if config.seed_paths.is_empty() {
        return Err(ConfigError::Validation(
            "seed-paths must contain at least one template".to_string(),
        ));
    }

    for path in &config.seed_paths {
        SeedTemplate::parse(path)?;
    }

    if config.max_pages_per_seed < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages-per-seed must be >= 1, got {}",
            config.max_pages_per_seed
        )));
    }

    if config.window_days > MAX_WINDOW_DAYS {
        return Err(ConfigError::Validation(format!(
            "window-days must be <= {}, got {}",
            MAX_WINDOW_DAYS, config.window_days
        )));
    }

    Ok(())
}

/// Validates fetch, retry and politeness settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.retries < 1 {
        return Err(ConfigError::Validation(format!(
            "retries must be >= 1, got {}",
            config.retries
        )));
    }

    if config.politeness_min_ms > config.politeness_max_ms {
        return Err(ConfigError::Validation(format!(
            "politeness-min-ms ({}) must not exceed politeness-max-ms ({})",
            config.politeness_min_ms, config.politeness_max_ms
        )));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
    {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-fetches must be between 1 and {}, got {}",
            MAX_CONCURRENT_FETCHES, config.max_concurrent_fetches
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the identifier store configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if !is_valid_table_name(&config.table) {
        return Err(ConfigError::Validation(format!(
            "table must match [A-Za-z_][A-Za-z0-9_]*, got '{}'",
            config.table
        )));
    }

    Ok(())
}

/// Validates the downstream notification configuration
fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    validate_http_url("notify base-url", &config.base_url)?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "notify timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a table name can be spliced into SQL as a bare identifier
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Parses `value` and requires an http or https scheme
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
