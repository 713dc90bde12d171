//! The `recordings` staging table.
//!
//! The table is never patched row by row: every non-dry-run sync calls
//! [`replace_recordings`], which swaps the whole content inside a single
//! transaction.

use std::collections::BTreeMap;

use duckdb::Connection;
use sheet_sync_models::{Decimal, RecordingRow};

use crate::DbError;

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 1_000;

/// Replaces the entire staging set with `rows`.
///
/// Deletes every existing row and bulk-inserts the new set inside one
/// transaction. If any insert fails the transaction is rolled back, so
/// the previous snapshot stays in place and the error is returned.
///
/// Rows sharing a natural key are collapsed, keeping the last occurrence.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if the delete, any insert, or the commit fails.
pub fn replace_recordings(conn: &Connection, rows: &[RecordingRow]) -> Result<u64, DbError> {
    let deduped = dedupe_by_key(rows);

    conn.execute_batch("BEGIN TRANSACTION;")?;

    match delete_and_insert(conn, &deduped) {
        Ok(written) => {
            conn.execute_batch("COMMIT;")?;
            Ok(written)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK;") {
                log::error!("Failed to roll back staging reload: {rollback_err}");
            }
            Err(e)
        }
    }
}

fn dedupe_by_key(rows: &[RecordingRow]) -> Vec<&RecordingRow> {
    let mut last_seen: BTreeMap<(&str, &str, &str), usize> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        last_seen.insert(row.key(), i);
    }

    let deduped: Vec<&RecordingRow> = rows
        .iter()
        .enumerate()
        .filter(|(i, row)| last_seen.get(&row.key()) == Some(i))
        .map(|(_, row)| row)
        .collect();

    if deduped.len() < rows.len() {
        log::info!(
            "Deduplicated staging rows: {} -> {} ({} duplicate keys)",
            rows.len(),
            deduped.len(),
            rows.len() - deduped.len(),
        );
    }

    deduped
}

fn delete_and_insert(conn: &Connection, rows: &[&RecordingRow]) -> Result<u64, DbError> {
    let deleted = conn.execute("DELETE FROM recordings", [])?;
    log::debug!("Cleared {deleted} staging row(s)");

    let mut total_inserted = 0u64;

    for chunk in rows.chunks(CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO recordings (
                series, course, subject, scheduled_hours, recorded_lessons,
                recording_status, percentage
            ) VALUES ",
        );

        for (i, _) in chunk.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?, ?, ?, CAST(? AS DECIMAL(5, 2)))");
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for row in chunk {
            stmt.raw_bind_parameter(param_idx, &row.series)?;
            stmt.raw_bind_parameter(param_idx + 1, &row.course)?;
            stmt.raw_bind_parameter(param_idx + 2, &row.subject)?;
            stmt.raw_bind_parameter(param_idx + 3, row.scheduled_hours)?;
            stmt.raw_bind_parameter(param_idx + 4, row.recorded_lessons)?;
            stmt.raw_bind_parameter(param_idx + 5, &row.recording_status)?;
            stmt.raw_bind_parameter(param_idx + 6, row.percentage.to_string())?;

            param_idx += 7;
        }

        let inserted = stmt.raw_execute()?;
        total_inserted += u64::try_from(inserted).unwrap_or(0);
    }

    Ok(total_inserted)
}

/// Returns the number of rows currently staged.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_recordings(conn: &Connection) -> Result<u64, DbError> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM recordings")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Returns every staged row ordered by natural key.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored percentage cannot be
/// read back.
pub fn list_recordings(conn: &Connection) -> Result<Vec<RecordingRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT series, course, subject, scheduled_hours, recorded_lessons,
                recording_status, percentage::TEXT
         FROM recordings
         ORDER BY series, course, subject",
    )?;
    stmt.raw_execute()?;

    let mut results = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let percentage: String = row.get(6)?;
        let percentage: Decimal = percentage.parse().map_err(|e| DbError::Conversion {
            message: format!("invalid stored percentage {percentage:?}: {e}"),
        })?;

        results.push(RecordingRow {
            series: row.get(0)?,
            course: row.get(1)?,
            subject: row.get(2)?,
            scheduled_hours: row.get(3)?,
            recorded_lessons: row.get(4)?,
            recording_status: row.get(5)?,
            percentage,
        });
    }

    Ok(results)
}
