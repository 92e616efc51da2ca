//! Statistics generation from the identifier store
//!
//! This module provides functionality for extracting and displaying
//! store statistics and the run ledger.

use crate::storage::{EventStore, RunRecord, RunStatus, StorageResult};
use chrono::{Duration, Utc};

/// Number of ledger rows shown
const RECENT_RUNS: usize = 5;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of identifiers ever stored
    pub total_event_ids: u64,

    /// Identifiers first observed in the last 24 hours
    pub first_seen_last_24h: u64,

    /// Identifiers observed in the last 24 hours
    pub last_seen_last_24h: u64,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from the store
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &dyn EventStore) -> StorageResult<StoreStatistics> {
    let since = Utc::now() - Duration::hours(24);

    Ok(StoreStatistics {
        total_event_ids: store.count_event_ids()?,
        first_seen_last_24h: store.count_first_seen_since(since)?,
        last_seen_last_24h: store.count_last_seen_since(since)?,
        recent_runs: store.latest_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Event Store Statistics ===\n");

    println!("Overview:");
    println!("  Total event IDs: {}", stats.total_event_ids);
    println!("  New in last 24h: {}", stats.first_seen_last_24h);
    println!("  Seen in last 24h: {}", stats.last_seen_last_24h);
    println!();

    if stats.recent_runs.is_empty() {
        println!("No runs recorded yet");
        return;
    }

    println!("Recent Runs ({}):", stats.recent_runs.len());
    for run in &stats.recent_runs {
        let summary = &run.summary;
        let duration = summary.finished_at - summary.started_at;
        println!(
            "  #{} {} [{}] {} pages ({} failed), {} ids, +{} new, {} refreshed, notify {}, {}s",
            run.id,
            summary.started_at.format("%Y-%m-%d %H:%M:%S"),
            summary.status.to_db_string(),
            summary.pages_crawled,
            summary.pages_failed,
            summary.unique_ids,
            summary.inserted,
            summary.modified,
            summary
                .notify_status
                .map(|status| status.to_string())
                .unwrap_or_else(|| "-".to_string()),
            duration.num_seconds()
        );
        if let Some(message) = &summary.error_message {
            println!("      {}", message);
        }
    }
    println!();

    let completed = stats
        .recent_runs
        .iter()
        .filter(|run| run.summary.status == RunStatus::Completed)
        .count();
    println!(
        "Completed: {} / {} recent runs",
        completed,
        stats.recent_runs.len()
    );
}
