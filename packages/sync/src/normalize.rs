//! Locale-tolerant cell parsing and worksheet row normalization.
//!
//! Sheet cells are typed by people using Brazilian conventions: `.` groups
//! thousands and `,` separates decimals (`1.234,5`, `62,50%`). Every parser
//! here falls back to a caller-supplied default rather than failing, so one
//! bad cell never aborts a sync.

use std::collections::BTreeMap;

use sheet_sync_models::{Decimal, PERCENT_MAX, PERCENT_MIN, RecordingRow};
use sheet_sync_sheet::SheetRecord;

use crate::schema::{
    COURSE, PERCENTAGE, RECORDED_LESSONS, RECORDING_STATUS, SCHEDULED_HOURS, SERIES, SUBJECT,
};

/// Fractional digits kept on percentages.
pub const PERCENT_SCALE: u32 = 2;

/// Drops whitespace (including non-breaking spaces) and `.` thousands
/// separators, and turns the `,` decimal separator into `.`.
#[must_use]
pub fn normalize_separators(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

fn parse_normalized(raw: &str) -> Option<Decimal> {
    let normalized = normalize_separators(raw);
    if normalized.is_empty() {
        return None;
    }
    normalized.parse().ok()
}

/// Drops the fractional part, rounding toward zero.
fn truncate(value: Decimal) -> Option<i64> {
    let divisor = 10_i128.checked_pow(value.scale())?;
    i64::try_from(value.mantissa() / divisor).ok()
}

/// Parses an integer cell, truncating any fractional part.
///
/// Returns `default` for missing, empty, or malformed input.
#[must_use]
pub fn parse_int(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(parse_normalized)
        .and_then(truncate)
        .unwrap_or(default)
}

/// Parses a decimal cell.
///
/// Returns `default` for missing, empty, or malformed input.
#[must_use]
pub fn parse_decimal(value: Option<&str>, default: Decimal) -> Decimal {
    value.and_then(parse_normalized).unwrap_or(default)
}

/// Parses a percentage cell, ignoring a trailing `%`, rounded half to even
/// to two fractional digits.
///
/// Returns `default` for missing, empty, or malformed input.
#[must_use]
pub fn parse_percent(value: Option<&str>, default: Decimal) -> Decimal {
    value
        .map(|raw| {
            let raw = raw.trim();
            raw.strip_suffix('%').unwrap_or(raw)
        })
        .and_then(parse_normalized)
        .and_then(|d| d.quantize(PERCENT_SCALE))
        .unwrap_or(default)
}

/// Largest count the staging table's `INTEGER` columns can hold.
pub const MAX_COUNT: u32 = i32::MAX.unsigned_abs();

/// Parses a count cell. Negative, unparseable, or oversized counts become
/// zero.
fn parse_count(value: &str) -> u32 {
    let parsed = parse_int(Some(value), 0);
    if parsed > i64::from(MAX_COUNT) {
        log::warn!("Count {parsed} exceeds {MAX_COUNT}; storing 0");
        return 0;
    }
    u32::try_from(parsed).unwrap_or(0)
}

/// Outcome of normalizing every record of a worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Rows ready for staging, in sheet order.
    pub rows: Vec<RecordingRow>,
    /// Records dropped because both course and subject were blank.
    pub skipped: u64,
    /// Records folded into a later record with the same natural key.
    pub duplicates: u64,
}

impl Normalized {
    /// Number of rows with non-zero completion.
    #[must_use]
    pub fn with_progress(&self) -> u64 {
        self.rows.iter().filter(|r| r.has_progress()).count() as u64
    }
}

/// Turns one worksheet record into a staging row.
///
/// Returns `None` when both `course` and `subject` are blank: such rows
/// are separators or leftovers and carry no identity.
#[must_use]
pub fn normalize_record(record: &SheetRecord) -> Option<RecordingRow> {
    let field = |name: &str| record.get(name).map_or("", |v| v.trim());

    let course = field(COURSE);
    let subject = field(SUBJECT);
    if course.is_empty() && subject.is_empty() {
        return None;
    }

    let mut percentage = parse_percent(Some(field(PERCENTAGE)), PERCENT_MIN);
    if !(PERCENT_MIN..=PERCENT_MAX).contains(&percentage) {
        log::warn!(
            "Percentage {percentage} for {course:?}/{subject:?} is outside 0-100; storing 0.00"
        );
        percentage = PERCENT_MIN;
    }

    Some(RecordingRow {
        series: field(SERIES).to_owned(),
        course: course.to_owned(),
        subject: subject.to_owned(),
        scheduled_hours: parse_count(field(SCHEDULED_HOURS)),
        recorded_lessons: parse_count(field(RECORDED_LESSONS)),
        recording_status: field(RECORDING_STATUS).to_owned(),
        percentage,
    })
}

/// Normalizes every record, counting the ones skipped.
///
/// Records sharing a `(series, course, subject)` key collapse into one row
/// carrying the values of the last occurrence.
#[must_use]
pub fn normalize_records(records: &[SheetRecord]) -> Normalized {
    let mut normalized = Normalized::default();
    let mut positions: BTreeMap<(String, String, String), usize> = BTreeMap::new();

    for record in records {
        let Some(row) = normalize_record(record) else {
            normalized.skipped += 1;
            continue;
        };

        let key = (row.series.clone(), row.course.clone(), row.subject.clone());
        if let Some(&i) = positions.get(&key) {
            normalized.rows[i] = row;
            normalized.duplicates += 1;
        } else {
            positions.insert(key, normalized.rows.len());
            normalized.rows.push(row);
        }
    }

    if normalized.duplicates > 0 {
        log::info!(
            "Collapsed {} record(s) with a repeated series/course/subject",
            normalized.duplicates
        );
    }

    if normalized.skipped > 0 {
        log::debug!(
            "Skipped {} record(s) without course or subject",
            normalized.skipped
        );
    }

    normalized
}
