//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the EventStore trait.
//! Every call opens its own connection and drops it before returning.

use crate::config::{is_valid_table_name, StorageConfig};
use crate::crawler::EventId;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{EventStore, StorageError, StorageResult};
use crate::storage::{EventRecord, RunRecord, RunStatus, RunSummary, UpsertOutcome};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits on a locked database
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite identifier store
#[derive(Debug, Clone)]
pub struct SqliteEventStore {
    path: PathBuf,
    table: String,
}

impl SqliteEventStore {
    /// Creates a store for the database at `path`
    ///
    /// Nothing is opened until the first operation.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `table` - Name of the identifier table
    pub fn new(path: impl AsRef<Path>, table: &str) -> StorageResult<Self> {
        if !is_valid_table_name(table) {
            return Err(StorageError::InvalidTable(table.to_string()));
        }

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            table: table.to_string(),
        })
    }

    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        Self::new(&config.database_path, &config.table)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Opens a connection and makes sure the schema exists
    fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn, &self.table)?;

        Ok(conn)
    }

    fn count_where(&self, column: &str, since: DateTime<Utc>) -> StorageResult<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} >= ?1",
                self.table, column
            ),
            params![format_timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl EventStore for SqliteEventStore {
    // ===== Identifiers =====

    fn upsert_event_ids(&self, ids: &[EventId]) -> StorageResult<UpsertOutcome> {
        if ids.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let mut conn = self.connect()?;
        let now = format_timestamp(Utc::now());
        let mut outcome = UpsertOutcome::default();
        let mut failures: Vec<(String, rusqlite::Error)> = Vec::new();

        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {} (ev_id, first_seen_at, last_seen_at) VALUES (?1, ?2, ?2)",
                self.table
            ))?;
            let mut touch = tx.prepare(&format!(
                "UPDATE {} SET last_seen_at = ?2 WHERE ev_id = ?1",
                self.table
            ))?;

            // Unordered bulk semantics: a failing record is noted and the
            // rest of the batch still goes through.
            for id in ids {
                let result = match insert.execute(params![id.as_str(), now]) {
                    Ok(0) => touch
                        .execute(params![id.as_str(), now])
                        .map(|updated| outcome.modified += updated as u64),
                    Ok(_) => {
                        outcome.inserted += 1;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };

                if let Err(e) = result {
                    tracing::warn!("Failed to upsert event id {}: {}", id, e);
                    failures.push((id.to_string(), e));
                }
            }
        }
        tx.commit()?;

        if let Some((id, error)) = failures.first() {
            return Err(StorageError::BulkWrite {
                attempted: ids.len(),
                failed: failures.len(),
                committed: outcome.changed(),
                first_error: format!("{}: {}", id, error),
            });
        }

        tracing::debug!(
            "Upserted {} ids into {} ({} inserted, {} modified)",
            ids.len(),
            self.table,
            outcome.inserted,
            outcome.modified
        );

        Ok(outcome)
    }

    fn get_event(&self, id: &str) -> StorageResult<Option<EventRecord>> {
        let conn = self.connect()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                &format!(
                    "SELECT ev_id, first_seen_at, last_seen_at FROM {} WHERE ev_id = ?1",
                    self.table
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(ev_id, first_seen_at, last_seen_at)| {
            Ok(EventRecord {
                ev_id,
                first_seen_at: parse_timestamp(&first_seen_at)?,
                last_seen_at: parse_timestamp(&last_seen_at)?,
            })
        })
        .transpose()
    }

    fn count_event_ids(&self) -> StorageResult<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_first_seen_since(&self, since: DateTime<Utc>) -> StorageResult<u64> {
        self.count_where("first_seen_at", since)
    }

    fn count_last_seen_since(&self, since: DateTime<Utc>) -> StorageResult<u64> {
        self.count_where("last_seen_at", since)
    }

    // ===== Run Ledger =====

    fn record_run(&self, run: &RunSummary) -> StorageResult<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO crawl_runs (started_at, finished_at, config_hash, pages_crawled,
             pages_failed, unique_ids, inserted, modified, notify_status, status, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                format_timestamp(run.started_at),
                format_timestamp(run.finished_at),
                run.config_hash,
                run.pages_crawled as i64,
                run.pages_failed as i64,
                run.unique_ids as i64,
                run.inserted as i64,
                run.modified as i64,
                run.notify_status,
                run.status.to_db_string(),
                run.error_message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, pages_crawled, pages_failed,
             unique_ids, inserted, modified, notify_status, status, error_message
             FROM crawl_runs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RawRun {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    pages_crawled: row.get(4)?,
                    pages_failed: row.get(5)?,
                    unique_ids: row.get(6)?,
                    inserted: row.get(7)?,
                    modified: row.get(8)?,
                    notify_status: row.get(9)?,
                    status: row.get(10)?,
                    error_message: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawRun::into_record).collect()
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.path.display(), self.table)
    }
}

/// A `crawl_runs` row before timestamp parsing
struct RawRun {
    id: i64,
    started_at: String,
    finished_at: String,
    config_hash: String,
    pages_crawled: i64,
    pages_failed: i64,
    unique_ids: i64,
    inserted: i64,
    modified: i64,
    notify_status: Option<u16>,
    status: String,
    error_message: Option<String>,
}

impl RawRun {
    fn into_record(self) -> StorageResult<RunRecord> {
        Ok(RunRecord {
            id: self.id,
            summary: RunSummary {
                started_at: parse_timestamp(&self.started_at)?,
                finished_at: parse_timestamp(&self.finished_at)?,
                config_hash: self.config_hash,
                pages_crawled: self.pages_crawled as u64,
                pages_failed: self.pages_failed as u64,
                unique_ids: self.unique_ids as u64,
                inserted: self.inserted as u64,
                modified: self.modified as u64,
                notify_status: self.notify_status,
                status: RunStatus::from_db_string(&self.status).unwrap_or(RunStatus::Failed),
                error_message: self.error_message,
            },
        })
    }
}

/// Fixed-width UTC timestamps so that text comparison matches time order
fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| StorageError::Timestamp {
            value: value.to_string(),
            message: e.to_string(),
        })
}
