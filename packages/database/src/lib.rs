#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for the sheet sync job.
//!
//! A single database file holds two tables: `sync_runs` (one audit row per
//! execution, see [`runs`]) and `recordings` (the staging table that every
//! non-dry-run sync reloads, see [`recordings`]).

pub mod paths;
pub mod recordings;
pub mod runs;

use std::path::Path;

use duckdb::Connection;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error while preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A row the caller expected to exist is absent.
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Opens (or creates) the sync database and ensures the schema exists.
///
/// `DuckDB` holds an exclusive file lock for a read-write connection, so a
/// second process opening the same file fails here instead of interleaving
/// writes with a running sync.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    log::debug!("Opened sync database at {}", path.display());

    Ok(conn)
}

/// Opens the sync database at the default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&paths::sync_db_path())
}

/// Opens a throwaway in-memory database with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_runs (
            id TEXT NOT NULL PRIMARY KEY,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            project TEXT,
            dry_run BOOLEAN NOT NULL DEFAULT FALSE,
            message TEXT NOT NULL DEFAULT '',
            errors TEXT NOT NULL DEFAULT '',
            succeeded BOOLEAN NOT NULL DEFAULT FALSE,
            rows_read BIGINT NOT NULL DEFAULT 0,
            rows_skipped BIGINT NOT NULL DEFAULT 0,
            rows_with_progress BIGINT NOT NULL DEFAULT 0,
            rows_written BIGINT NOT NULL DEFAULT 0,
            started_at TIMESTAMP NOT NULL,
            finished_at TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS recordings (
            series TEXT NOT NULL,
            course TEXT NOT NULL,
            subject TEXT NOT NULL,
            scheduled_hours INTEGER NOT NULL,
            recorded_lessons INTEGER NOT NULL,
            recording_status TEXT NOT NULL,
            percentage DECIMAL(5, 2) NOT NULL,
            PRIMARY KEY (series, course, subject)
        );",
    )?;

    Ok(())
}

/// Formats a timestamp the way it is bound into `TIMESTAMP` columns.
fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parses a `DuckDB` `TIMESTAMP` text representation into a UTC `DateTime`.
///
/// The `::TEXT` cast drops the fractional part when it is zero, so both
/// `2024-01-15 10:30:00` and `2024-01-15 10:30:00.123456` appear.
fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, DbError> {
    use chrono::{DateTime, NaiveDateTime, Utc};

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(DbError::Conversion {
        message: format!("unparseable timestamp {s:?}"),
    })
}
