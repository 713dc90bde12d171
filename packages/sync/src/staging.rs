//! Writes normalized rows to the `recordings` staging table.

use std::collections::BTreeSet;

use duckdb::Connection;
use sheet_sync_database::recordings;
use sheet_sync_models::RecordingRow;

use crate::SyncError;

/// Replaces the staging snapshot with `rows`, or on a dry run only counts
/// what would be written.
///
/// Returns the number of distinct rows written (or that would be).
///
/// # Errors
///
/// Returns [`SyncError::Persistence`] if the reload fails. The previous
/// snapshot is left in place.
pub fn write_staging(
    conn: &Connection,
    rows: &[RecordingRow],
    dry_run: bool,
) -> Result<u64, SyncError> {
    if dry_run {
        let distinct = rows.iter().map(RecordingRow::key).collect::<BTreeSet<_>>();
        let count = distinct.len() as u64;
        log::info!("Dry run: {count} row(s) would be written to staging");
        return Ok(count);
    }

    let written = recordings::replace_recordings(conn, rows)?;
    log::info!("Reloaded staging with {written} row(s)");

    Ok(written)
}
