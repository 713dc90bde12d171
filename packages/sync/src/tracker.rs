//! Run record lifecycle.
//!
//! A [`RunTracker`] owns the in-memory [`RunRecord`] of one execution and
//! mirrors each step to the `sync_runs` table. Every run it creates ends up
//! terminal with `finished_at` stamped: if the tracker is dropped before
//! [`RunTracker::finalize`], the run is recorded as failed.

use chrono::Utc;
use duckdb::Connection;
use sheet_sync_database::{DbError, runs};
use sheet_sync_models::{InvalidTransitionError, RowSummary, RunKind, RunRecord, RunStatus};

use crate::SyncError;

/// Error text recorded when a run is abandoned before an outcome is set.
pub const ABORTED_MESSAGE: &str = "run aborted before completion";

/// Tracks one run from creation to its terminal status.
pub struct RunTracker<'a> {
    conn: &'a Connection,
    record: RunRecord,
    finalized: bool,
}

impl<'a> RunTracker<'a> {
    /// Creates and persists a `Pending` run.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub fn create(
        conn: &'a Connection,
        kind: RunKind,
        project: Option<String>,
        dry_run: bool,
    ) -> Result<Self, DbError> {
        let record = RunRecord::new(kind, project, dry_run, Utc::now());
        runs::insert_run(conn, &record)?;
        log::info!("Created run {} ({record})", record.id);

        Ok(Self {
            conn,
            record,
            finalized: false,
        })
    }

    /// The current state of the run.
    #[must_use]
    pub const fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Moves the run to `Running` and persists the status.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the transition is not allowed or the update
    /// fails.
    pub fn mark_running(&mut self) -> Result<(), SyncError> {
        self.record.transition(RunStatus::Running)?;
        runs::update_run_status(self.conn, self.record.id, RunStatus::Running)?;
        log::debug!("Run {} is running", self.record.id);
        Ok(())
    }

    /// Records a successful outcome. Persisted by [`Self::finalize`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransitionError`] unless the run is `Running`.
    pub fn mark_succeeded(
        &mut self,
        message: String,
        summary: RowSummary,
    ) -> Result<(), InvalidTransitionError> {
        self.record.transition(RunStatus::Succeeded)?;
        self.record.succeeded = true;
        self.record.message = message;
        self.record.summary = summary;
        Ok(())
    }

    /// Records a failed outcome. Persisted by [`Self::finalize`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransitionError`] if the run already has an outcome.
    pub fn mark_failed(&mut self, detail: &str) -> Result<(), InvalidTransitionError> {
        self.record.transition(RunStatus::Failed)?;
        self.record.succeeded = false;
        detail.clone_into(&mut self.record.errors);
        Ok(())
    }

    /// Stamps `finished_at` and writes the final record.
    ///
    /// A run with no outcome yet is marked failed first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the final write fails.
    pub fn finalize(mut self) -> Result<RunRecord, DbError> {
        self.finish()?;
        Ok(self.record.clone())
    }

    fn finish(&mut self) -> Result<(), DbError> {
        if !self.record.status.is_terminal() && self.mark_failed(ABORTED_MESSAGE).is_err() {
            self.record.status = RunStatus::Failed;
            self.record.succeeded = false;
            ABORTED_MESSAGE.clone_into(&mut self.record.errors);
        }

        self.record.finished_at = Some(Utc::now());
        self.finalized = true;

        runs::save_run(self.conn, &self.record)?;
        log::info!("Finished run {} ({})", self.record.id, self.record);

        Ok(())
    }
}

impl Drop for RunTracker<'_> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }

        log::warn!("Run {} dropped before finalize; recording failure", self.record.id);
        if let Err(e) = self.finish() {
            log::error!("Failed to record aborted run {}: {e}", self.record.id);
        }
    }
}
