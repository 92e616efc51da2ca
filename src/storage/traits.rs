//! Storage traits and error types
//!
//! This module defines the trait interface for identifier stores and
//! associated error types.

use crate::crawler::EventId;
use crate::storage::{EventRecord, RunRecord, RunSummary, UpsertOutcome};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// Some records of a bulk upsert failed; the others were committed
    #[error(
        "Bulk write failed for {failed} of {attempted} records ({committed} committed): {first_error}"
    )]
    BulkWrite {
        attempted: usize,
        failed: usize,
        committed: u64,
        first_error: String,
    },

    #[error("Invalid timestamp '{value}': {message}")]
    Timestamp { value: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for identifier store implementations
///
/// Implementations acquire their connection per call; nothing is held open
/// between calls.
pub trait EventStore: Send + Sync {
    // ===== Identifiers =====

    /// Idempotently records a batch of identifiers
    ///
    /// New identifiers get `first_seen_at = last_seen_at = now`; existing
    /// ones only have `last_seen_at` moved to `now`. An empty batch performs
    /// no store operation and returns a zero outcome.
    fn upsert_event_ids(&self, ids: &[EventId]) -> StorageResult<UpsertOutcome>;

    /// Gets the record for one identifier
    fn get_event(&self, id: &str) -> StorageResult<Option<EventRecord>>;

    /// Counts all stored identifiers
    fn count_event_ids(&self) -> StorageResult<u64>;

    /// Counts identifiers first observed at or after `since`
    fn count_first_seen_since(&self, since: DateTime<Utc>) -> StorageResult<u64>;

    /// Counts identifiers last observed at or after `since`
    fn count_last_seen_since(&self, since: DateTime<Utc>) -> StorageResult<u64>;

    // ===== Run Ledger =====

    /// Records a finished run and returns its ID
    fn record_run(&self, run: &RunSummary) -> StorageResult<i64>;

    /// Gets the most recent runs, newest first
    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Human-readable location of the store, for progress output
    fn describe(&self) -> String;
}
