//! Storage module for persisting event identifiers
//!
//! This module handles all database operations for the sweep, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts of identifiers with first/last observation times
//! - The run ledger

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteEventStore;
pub use traits::{EventStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// Counts reported by a bulk upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Identifiers stored for the first time
    pub inserted: u64,

    /// Existing identifiers whose `last_seen_at` was rewritten
    pub modified: u64,
}

impl UpsertOutcome {
    /// Inserted plus modified
    pub fn changed(&self) -> u64 {
        self.inserted + self.modified
    }
}

/// Represents a stored identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub ev_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Identifiers persisted and the downstream service notified
    Completed,
    /// Identifiers persisted but the notification failed
    NotifyFailed,
    /// Persistence failed
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NotifyFailed => "notify_failed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "notify_failed" => Some(Self::NotifyFailed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// What a run did, as written to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,
    pub pages_crawled: u64,
    pub pages_failed: u64,
    pub unique_ids: u64,
    pub inserted: u64,
    pub modified: u64,
    /// HTTP status returned by the downstream service, if it answered
    pub notify_status: Option<u16>,
    pub status: RunStatus,
    pub error_message: Option<String>,
}

/// Represents a run in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub summary: RunSummary,
}
