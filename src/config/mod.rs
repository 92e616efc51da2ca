//! Configuration module for Event-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! with a small set of environment overrides for deployment secrets.
//!
//! # Example
//!
//! ```no_run
//! use event_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Pages per seed: {}", config.site.max_pages_per_seed);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, NotifyConfig, SiteConfig, StorageConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash,
    ENV_DATABASE_PATH, ENV_NOTIFY_URL, ENV_TABLE,
};
pub use validation::{is_valid_table_name, validate};
