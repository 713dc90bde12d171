#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Run record, staging row, and decimal types for the sheet sync job.
//!
//! A [`RunRecord`] is the audit entry written once per execution. A
//! [`RecordingRow`] is one normalized line of the `RECORDING` worksheet as
//! stored in the staging table.

pub mod decimal;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

pub use decimal::{Decimal, ParseDecimalError};

/// Lowest completion percentage a staging row may carry.
pub const PERCENT_MIN: Decimal = Decimal::new(0, 2);

/// Highest completion percentage a staging row may carry.
pub const PERCENT_MAX: Decimal = Decimal::new(10_000, 2);

/// The kind of job a run record describes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunKind {
    /// Worksheet to staging table synchronization.
    SyncSheet,
}

/// Lifecycle status of a run.
///
/// The job itself only ever moves `Pending -> Running -> {Succeeded,
/// Failed}`. `Paused` is set by an operator editing the record directly.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Created, not started yet.
    Pending,
    /// Fetching, validating, or writing.
    Running,
    /// Finished without error.
    Succeeded,
    /// Finished with an error recorded in [`RunRecord::errors`].
    Failed,
    /// Held by an operator.
    Paused,
}

impl RunStatus {
    /// Returns `true` for statuses that end a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns whether the job may move a run from `self` to `next`.
    ///
    /// `Pending -> Failed` covers runs that fail before they could be
    /// marked running.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

/// Error returned when a run is asked to make a transition the state
/// machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransitionError {
    /// Status the run was in.
    pub from: RunStatus,
    /// Status that was requested.
    pub to: RunStatus,
}

impl std::fmt::Display for InvalidTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid run transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransitionError {}

/// Row counters gathered while normalizing a worksheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSummary {
    /// Data rows fetched from the worksheet, header excluded.
    pub rows_read: u64,
    /// Rows dropped because they had no identifying fields.
    pub rows_skipped: u64,
    /// Normalized rows whose completion percentage is non-zero.
    pub rows_with_progress: u64,
    /// Rows written to staging, or that would be written on a dry run.
    pub rows_written: u64,
}

/// The persisted audit entry for one execution of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Primary key.
    pub id: Uuid,
    /// Which job ran.
    pub kind: RunKind,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Optional scope label passed on the command line.
    pub project: Option<String>,
    /// Whether staging mutation was suppressed.
    pub dry_run: bool,
    /// Human-readable summary of the outcome.
    pub message: String,
    /// Error detail; empty when the run did not fail.
    pub errors: String,
    /// Outcome flag, `true` only for [`RunStatus::Succeeded`].
    pub succeeded: bool,
    /// Row counters recorded on success.
    pub summary: RowSummary,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status. Set exactly once.
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Creates a fresh `Pending` record.
    #[must_use]
    pub fn new(
        kind: RunKind,
        project: Option<String>,
        dry_run: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: RunStatus::Pending,
            project,
            dry_run,
            message: String::new(),
            errors: String::new(),
            succeeded: false,
            summary: RowSummary::default(),
            started_at,
            finished_at: None,
        }
    }

    /// Moves the record to `next` if the state machine allows it.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransitionError`] if `self.status` cannot move to
    /// `next`.
    pub const fn transition(&mut self, next: RunStatus) -> Result<(), InvalidTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Returns `true` once `finished_at` has been stamped.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

impl std::fmt::Display for RunRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.kind,
            self.status,
            self.started_at.format("%d/%m %H:%M")
        )
    }
}

/// One normalized line of the `RECORDING` worksheet.
///
/// `(series, course, subject)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRow {
    /// School year or grade the course belongs to.
    pub series: String,
    /// Course name.
    pub course: String,
    /// Subject within the course.
    pub subject: String,
    /// Scheduled workload in hours.
    pub scheduled_hours: u32,
    /// Number of lessons already recorded.
    pub recorded_lessons: u32,
    /// Free-text recording status as typed in the sheet.
    pub recording_status: String,
    /// Completion percentage in `[0, 100]` with two fractional digits.
    pub percentage: Decimal,
}

impl RecordingRow {
    /// Returns the natural key of this row.
    #[must_use]
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.series, &self.course, &self.subject)
    }

    /// Returns `true` if any completion has been recorded.
    #[must_use]
    pub const fn has_progress(&self) -> bool {
        !self.percentage.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(RunStatus::Succeeded.as_ref(), "SUCCEEDED");
        assert_eq!("PAUSED".parse::<RunStatus>().unwrap(), RunStatus::Paused);
        assert_eq!(RunKind::SyncSheet.to_string(), "sync_sheet");
    }

    #[test]
    fn only_forward_transitions_are_allowed() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Succeeded));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Succeeded));
        assert!(!RunStatus::Succeeded.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Paused));
        assert!(!RunStatus::Paused.can_transition_to(RunStatus::Running));
    }

    #[test]
    fn transition_rejects_illegal_moves() {
        let mut record = RunRecord::new(RunKind::SyncSheet, None, false, Utc::now());
        let err = record.transition(RunStatus::Succeeded).unwrap_err();
        assert_eq!(err.from, RunStatus::Pending);
        assert_eq!(err.to, RunStatus::Succeeded);
        assert_eq!(record.status, RunStatus::Pending);

        record.transition(RunStatus::Running).unwrap();
        record.transition(RunStatus::Succeeded).unwrap();
        assert!(record.status.is_terminal());
    }

    #[test]
    fn displays_like_the_admin_list() {
        let started = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 0).unwrap();
        let mut record = RunRecord::new(RunKind::SyncSheet, None, true, started);
        record.status = RunStatus::Failed;
        assert_eq!(record.to_string(), "sync_sheet [FAILED] 07/03 09:05");
    }

    #[test]
    fn percent_bounds_compare_by_value() {
        assert_eq!(PERCENT_MAX, Decimal::from(100_i64));
        assert_eq!(PERCENT_MIN, Decimal::ZERO);
    }
}
