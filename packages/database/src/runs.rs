//! Persistence for [`RunRecord`] audit rows in the `sync_runs` table.

use std::str::FromStr as _;

use duckdb::Connection;
use sheet_sync_models::{RowSummary, RunKind, RunRecord, RunStatus};
use uuid::Uuid;

use crate::{DbError, format_timestamp, parse_timestamp};

const SELECT_COLUMNS: &str = "SELECT id, kind, status, project, dry_run, message, errors, succeeded,
        rows_read, rows_skipped, rows_with_progress, rows_written,
        started_at::TEXT, finished_at::TEXT
     FROM sync_runs";

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Inserts a newly created run.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn insert_run(conn: &Connection, run: &RunRecord) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO sync_runs (
            id, kind, status, project, dry_run, message, errors, succeeded,
            rows_read, rows_skipped, rows_with_progress, rows_written,
            started_at, finished_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
        duckdb::params![
            run.id.to_string(),
            run.kind.as_ref(),
            run.status.as_ref(),
            run.project.as_deref(),
            run.dry_run,
            &run.message,
            &run.errors,
            run.succeeded,
            to_i64(run.summary.rows_read),
            to_i64(run.summary.rows_skipped),
            to_i64(run.summary.rows_with_progress),
            to_i64(run.summary.rows_written),
            format_timestamp(&run.started_at),
            run.finished_at.as_ref().map(format_timestamp),
        ],
    )?;

    Ok(())
}

/// Updates only the status column of a run.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails or no run has this id.
pub fn update_run_status(conn: &Connection, id: Uuid, status: RunStatus) -> Result<(), DbError> {
    let rows = conn.execute(
        "UPDATE sync_runs SET status = ? WHERE id = ?",
        duckdb::params![status.as_ref(), id.to_string()],
    )?;

    if rows == 0 {
        return Err(DbError::NotFound {
            message: format!("no run with id {id}"),
        });
    }

    Ok(())
}

/// Writes every mutable field of a run back to the database.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails or no run has this id.
pub fn save_run(conn: &Connection, run: &RunRecord) -> Result<(), DbError> {
    let rows = conn.execute(
        "UPDATE sync_runs SET
            status = ?,
            message = ?,
            errors = ?,
            succeeded = ?,
            rows_read = ?,
            rows_skipped = ?,
            rows_with_progress = ?,
            rows_written = ?,
            finished_at = CAST(? AS TIMESTAMP)
         WHERE id = ?",
        duckdb::params![
            run.status.as_ref(),
            &run.message,
            &run.errors,
            run.succeeded,
            to_i64(run.summary.rows_read),
            to_i64(run.summary.rows_skipped),
            to_i64(run.summary.rows_with_progress),
            to_i64(run.summary.rows_written),
            run.finished_at.as_ref().map(format_timestamp),
            run.id.to_string(),
        ],
    )?;

    if rows == 0 {
        return Err(DbError::NotFound {
            message: format!("no run with id {}", run.id),
        });
    }

    Ok(())
}

/// Loads a single run by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value cannot be
/// converted back into a [`RunRecord`].
pub fn get_run(conn: &Connection, id: Uuid) -> Result<Option<RunRecord>, DbError> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?"))?;
    stmt.raw_bind_parameter(1, id.to_string())?;
    stmt.raw_execute()?;

    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => Ok(Some(read_run(row)?)),
        None => Ok(None),
    }
}

/// Returns the most recent runs, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value cannot be
/// converted back into a [`RunRecord`].
pub fn list_runs(conn: &Connection, limit: u64) -> Result<Vec<RunRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} ORDER BY started_at DESC LIMIT {limit}"
    ))?;
    stmt.raw_execute()?;

    let mut runs = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        runs.push(read_run(row)?);
    }

    Ok(runs)
}

fn read_run(row: &duckdb::Row<'_>) -> Result<RunRecord, DbError> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let status: String = row.get(2)?;
    let started_at: String = row.get(12)?;
    let finished_at: Option<String> = row.get(13)?;

    Ok(RunRecord {
        id: Uuid::parse_str(&id).map_err(|e| DbError::Conversion {
            message: format!("invalid run id {id:?}: {e}"),
        })?,
        kind: RunKind::from_str(&kind).map_err(|e| DbError::Conversion {
            message: format!("invalid run kind {kind:?}: {e}"),
        })?,
        status: RunStatus::from_str(&status).map_err(|e| DbError::Conversion {
            message: format!("invalid run status {status:?}: {e}"),
        })?,
        project: row.get(3)?,
        dry_run: row.get(4)?,
        message: row.get(5)?,
        errors: row.get(6)?,
        succeeded: row.get(7)?,
        summary: RowSummary {
            rows_read: to_u64(row.get(8)?),
            rows_skipped: to_u64(row.get(9)?),
            rows_with_progress: to_u64(row.get(10)?),
            rows_written: to_u64(row.get(11)?),
        },
        started_at: parse_timestamp(&started_at)?,
        finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample_run(project: Option<&str>) -> RunRecord {
        RunRecord::new(
            RunKind::SyncSheet,
            project.map(str::to_string),
            false,
            Utc::now(),
        )
    }

    #[test]
    fn inserted_run_reads_back() {
        let conn = crate::open_in_memory().unwrap();
        let run = sample_run(Some("SEDUC TEC 1.0"));
        insert_run(&conn, &run).unwrap();

        let loaded = get_run(&conn, run.id).unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.status, RunStatus::Pending);
        assert_eq!(loaded.project.as_deref(), Some("SEDUC TEC 1.0"));
        assert_eq!(loaded.finished_at, None);
        assert_eq!(
            loaded.started_at.timestamp_micros(),
            run.started_at.timestamp_micros()
        );
    }

    #[test]
    fn status_update_touches_only_status() {
        let conn = crate::open_in_memory().unwrap();
        let run = sample_run(None);
        insert_run(&conn, &run).unwrap();

        update_run_status(&conn, run.id, RunStatus::Running).unwrap();

        let loaded = get_run(&conn, run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Running);
        assert_eq!(loaded.message, "");
        assert!(loaded.finished_at.is_none());
    }

    #[test]
    fn save_persists_final_fields() {
        let conn = crate::open_in_memory().unwrap();
        let mut run = sample_run(None);
        insert_run(&conn, &run).unwrap();

        run.status = RunStatus::Failed;
        run.errors = "boom".to_string();
        run.summary.rows_read = 7;
        run.finished_at = Some(Utc::now());
        save_run(&conn, &run).unwrap();

        let loaded = get_run(&conn, run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Failed);
        assert_eq!(loaded.errors, "boom");
        assert_eq!(loaded.summary.rows_read, 7);
        assert!(loaded.finished_at.is_some());
        assert!(!loaded.succeeded);
    }

    #[test]
    fn missing_run_is_reported() {
        let conn = crate::open_in_memory().unwrap();
        let run = sample_run(None);

        assert!(get_run(&conn, run.id).unwrap().is_none());
        assert!(matches!(
            update_run_status(&conn, run.id, RunStatus::Running),
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(save_run(&conn, &run), Err(DbError::NotFound { .. })));
    }

    #[test]
    fn lists_newest_first() {
        let conn = crate::open_in_memory().unwrap();
        let mut older = sample_run(Some("old"));
        older.started_at = Utc::now() - Duration::hours(2);
        let newer = sample_run(Some("new"));

        insert_run(&conn, &older).unwrap();
        insert_run(&conn, &newer).unwrap();

        let runs = list_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, newer.id);
        assert_eq!(runs[1].id, older.id);

        assert_eq!(list_runs(&conn, 1).unwrap().len(), 1);
    }

    #[test]
    fn loads_operator_paused_status() {
        let conn = crate::open_in_memory().unwrap();
        let run = sample_run(None);
        insert_run(&conn, &run).unwrap();
        conn.execute(
            "UPDATE sync_runs SET status = 'PAUSED' WHERE id = ?",
            [run.id.to_string()],
        )
        .unwrap();

        let loaded = get_run(&conn, run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Paused);
    }
}
