//! Database schema definitions
//!
//! The identifier table name is configurable, so its DDL is rendered at
//! runtime; callers must pass a name that passed
//! [`is_valid_table_name`](crate::config::is_valid_table_name).

/// SQL schema for the run ledger
pub const RUNS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    pages_crawled INTEGER NOT NULL,
    pages_failed INTEGER NOT NULL,
    unique_ids INTEGER NOT NULL,
    inserted INTEGER NOT NULL,
    modified INTEGER NOT NULL,
    notify_status INTEGER,
    status TEXT NOT NULL,
    error_message TEXT
);
"#;

/// Renders the DDL for the identifier table
pub fn event_table_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    ev_id TEXT PRIMARY KEY NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_first_seen ON {table}(first_seen_at);
CREATE INDEX IF NOT EXISTS idx_{table}_last_seen ON {table}(last_seen_at);
"#
    )
}

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `table` - Name of the identifier table
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection, table: &str) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&event_table_sql(table))?;
    conn.execute_batch(RUNS_SCHEMA_SQL)?;
    Ok(())
}
