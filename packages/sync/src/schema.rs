//! Worksheet column contract.

use std::collections::BTreeSet;

use sheet_sync_sheet::SheetRecord;

use crate::SyncError;

/// Course name column.
pub const COURSE: &str = "course";
/// Subject column.
pub const SUBJECT: &str = "subject";
/// School year or grade column.
pub const SERIES: &str = "series";
/// Scheduled workload, in hours.
pub const SCHEDULED_HOURS: &str = "scheduled-hours";
/// Lessons recorded so far.
pub const RECORDED_LESSONS: &str = "recorded-lessons";
/// Free-text recording status.
pub const RECORDING_STATUS: &str = "recording-status";
/// Completion percentage, e.g. `62,50%`.
pub const PERCENTAGE: &str = "percentage";

/// Columns the `RECORDING` tab must carry.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    COURSE,
    SUBJECT,
    SERIES,
    SCHEDULED_HOURS,
    RECORDED_LESSONS,
    RECORDING_STATUS,
    PERCENTAGE,
];

/// Returns `required - present`, compared case-insensitively, sorted.
#[must_use]
pub fn missing_columns<'a, I>(present: I, required: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: BTreeSet<String> = present
        .into_iter()
        .map(|name| name.trim().to_lowercase())
        .collect();

    required
        .iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !present.contains(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Checks the columns of the first record against `required`.
///
/// A worksheet with no data rows passes: there is nothing to sync.
///
/// # Errors
///
/// Returns [`SyncError::SchemaMismatch`] listing every missing column.
pub fn validate_records(records: &[SheetRecord], required: &[&str]) -> Result<(), SyncError> {
    let Some(first) = records.first() else {
        log::info!("Worksheet has no data rows; skipping schema check");
        return Ok(());
    };

    let missing = missing_columns(first.keys().map(String::as_str), required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SyncError::SchemaMismatch { missing })
    }
}
