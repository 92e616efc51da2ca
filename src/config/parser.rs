use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Overrides `storage.database-path`
pub const ENV_DATABASE_PATH: &str = "EVENT_SWEEP_DATABASE_PATH";

/// Overrides `storage.table`
pub const ENV_TABLE: &str = "EVENT_SWEEP_TABLE";

/// Overrides `notify.base-url`
pub const ENV_NOTIFY_URL: &str = "EVENT_SWEEP_NOTIFY_URL";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate(&config)?;

    Ok(config)
}

/// Replaces deployment-specific settings with values from the environment
///
/// `lookup` returns the value of a variable, or `None` when it is unset.
/// Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(path) = non_empty(ENV_DATABASE_PATH) {
        tracing::debug!("Database path overridden by {}", ENV_DATABASE_PATH);
        config.storage.database_path = path;
    }

    if let Some(table) = non_empty(ENV_TABLE) {
        tracing::debug!("Table overridden by {}", ENV_TABLE);
        config.storage.table = table;
    }

    if let Some(url) = non_empty(ENV_NOTIFY_URL) {
        tracing::debug!("Notify URL overridden by {}", ENV_NOTIFY_URL);
        config.notify.base_url = url;
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stored with every run so that runs made with different
/// configurations can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
