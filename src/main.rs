//! Event-Sweep main entry point
//!
//! This is the command-line interface for the Event-Sweep identifier harvester.

use clap::Parser;
use event_sweep::config::{load_config_with_hash, Config};
use event_sweep::crawler::{DateWindow, SeedUrls};
use event_sweep::pipeline::NotificationStatus;
use event_sweep::run_job_with_hash;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Event-Sweep: a batch harvester for event identifiers
///
/// Event-Sweep walks the paginated listing views of an events site over a
/// rolling date window, stores every event identifier it finds, and asks
/// the downstream service to fetch the new events.
#[derive(Parser, Debug)]
#[command(name = "event-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A batch harvester for event identifiers", long_about = None)]
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

    /// Validate config and show which pages would be swept without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the identifier store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_run(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("event_sweep=info,warn"),
            1 => EnvFilter::new("event_sweep=debug,info"),
            2 => EnvFilter::new("event_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be swept
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Event-Sweep Dry Run ===\n");

    let window = DateWindow::starting_today(config.site.window_days)?;
    let seeds = SeedUrls::from_config(&config.site, window)?;

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!(
        "  Window: {} to {} ({} days)",
        window.start_param(),
        window.end_param(),
        config.site.window_days
    );
    println!("  Pages per seed: {}", config.site.max_pages_per_seed);

    println!("\nSeed Paths ({}):", seeds.templates().len());
    for template in seeds.templates() {
        println!("  - {}", template.as_str());
    }
    if let Some(sample) = seeds.sample_url() {
        println!("  Sample URL: {}", sample);
    }

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!(
        "  Attempts: {} (backoff {}ms base, {}ms jitter)",
        config.fetch.retries, config.fetch.backoff_base_ms, config.fetch.backoff_jitter_ms
    );
    println!(
        "  Politeness: {}-{}ms",
        config.fetch.politeness_min_ms, config.fetch.politeness_max_ms
    );
    println!(
        "  Concurrent fetches: {}",
        config.fetch.max_concurrent_fetches
    );
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Table: {}", config.storage.table);

    println!("\nNotify:");
    println!("  Base URL: {}", config.notify.base_url);

    println!("\n✓ Configuration is valid");
    println!("✓ Would fetch {} listing pages", seeds.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the identifier store
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use event_sweep::output::{load_statistics, print_statistics};
    use event_sweep::storage::SqliteEventStore;

    println!(
        "Database: {} (table {})\n",
        config.storage.database_path, config.storage.table
    );

    let store = SqliteEventStore::from_config(&config.storage)?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main sweep operation
async fn handle_run(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Sweeping {} seed paths x {} pages on {}",
        config.site.seed_paths.len(),
        config.site.max_pages_per_seed,
        config.site.base_url
    );

    let report = match run_job_with_hash(config, config_hash).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Sweep failed: {}", e);
            return Err(e.into());
        }
    };

    match report.notification {
        NotificationStatus::Delivered(_) => {
            tracing::info!("Sweep completed successfully");
            Ok(())
        }
        NotificationStatus::Failed(message) => {
            Err(format!("identifiers persisted but notification failed: {}", message).into())
        }
    }
}
