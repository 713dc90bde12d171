#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Synchronizes the `RECORDING` worksheet into the `recordings` staging
//! table.
//!
//! One call to [`sync_sheet`] is one audited run: a `sync_runs` row is
//! created before anything else happens, the worksheet is fetched,
//! validated, normalized, and (unless it is a dry run) swapped into staging
//! in a single transaction, and the run is finalized with either a summary
//! or the error that stopped it.

pub mod config;
pub mod normalize;
pub mod schema;
pub mod staging;
pub mod tracker;

use std::time::Instant;

use duckdb::Connection;
use sheet_sync_database::DbError;
use sheet_sync_models::{InvalidTransitionError, RowSummary, RunKind, RunRecord};
use sheet_sync_sheet::{SheetError, WorksheetSource};

use crate::config::SyncConfig;
use crate::tracker::RunTracker;

/// Errors that stop a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A required setting is absent under every accepted name.
    #[error("Missing configuration: {parameter} (set one of {})", .candidates.join(", "))]
    MissingConfiguration {
        /// Logical parameter name.
        parameter: &'static str,
        /// Setting names checked, in priority order.
        candidates: &'static [&'static str],
    },

    /// The worksheet lacks required columns.
    #[error("Worksheet is missing required column(s): {}", .missing.join(", "))]
    SchemaMismatch {
        /// Missing column names, sorted.
        missing: Vec<String>,
    },

    /// The spreadsheet service could not be reached or rejected the read.
    #[error("Sheet fetch failed: {0}")]
    Connection(#[from] SheetError),

    /// A database read or write failed.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DbError),

    /// Anything else.
    #[error("{0}")]
    Unclassified(String),
}

impl From<InvalidTransitionError> for SyncError {
    fn from(e: InvalidTransitionError) -> Self {
        Self::Unclassified(e.to_string())
    }
}

/// Per-invocation switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Fetch and validate but leave staging untouched.
    pub dry_run: bool,
    /// Optional scope label stored on the run record.
    pub project: Option<String>,
}

/// Runs one synchronization and returns its finalized run record.
///
/// The run record is always finalized, including when this returns an
/// error: the failed record is persisted with the error text before the
/// error is handed back.
///
/// # Errors
///
/// Returns [`SyncError`] if configuration is missing, the worksheet cannot
/// be fetched or fails validation, or a database write fails.
#[allow(clippy::future_not_send)]
pub async fn sync_sheet(
    conn: &Connection,
    source: &dyn WorksheetSource,
    config: &SyncConfig,
    options: &SyncOptions,
) -> Result<RunRecord, SyncError> {
    let start = Instant::now();
    let project = options
        .project
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned);

    let mut tracker = RunTracker::create(conn, RunKind::SyncSheet, project, options.dry_run)?;

    let result = match tracker.mark_running() {
        Ok(()) => run_steps(conn, source, config, options.dry_run).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => {
            tracker.mark_succeeded(summary_message(&summary, options.dry_run), summary)?;
            let record = tracker.finalize()?;
            log::info!(
                "Sync finished in {:.1}s: {}",
                start.elapsed().as_secs_f64(),
                record.message
            );
            Ok(record)
        }
        Err(e) => {
            log::error!("Sync failed: {e}");
            if let Err(transition) = tracker.mark_failed(&e.to_string()) {
                log::error!("Could not mark run failed: {transition}");
            }
            if let Err(save) = tracker.finalize() {
                log::error!("Could not record failed run: {save}");
            }
            Err(e)
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run_steps(
    conn: &Connection,
    source: &dyn WorksheetSource,
    config: &SyncConfig,
    dry_run: bool,
) -> Result<RowSummary, SyncError> {
    let target = config.sheet_target()?;
    log::info!(
        "Fetching worksheet {:?} of {} via {}",
        target.worksheet,
        target.spreadsheet_id,
        source.name()
    );

    let worksheet = source.fetch(&target).await?;
    let records = worksheet.records();
    schema::validate_records(&records, &schema::REQUIRED_COLUMNS)?;

    let normalized = normalize::normalize_records(&records);
    let rows_written = staging::write_staging(conn, &normalized.rows, dry_run)?;

    Ok(RowSummary {
        rows_read: records.len() as u64,
        rows_skipped: normalized.skipped,
        rows_with_progress: normalized.with_progress(),
        rows_written,
    })
}

fn summary_message(summary: &RowSummary, dry_run: bool) -> String {
    let outcome = if dry_run {
        format!("dry run, {} would be written", summary.rows_written)
    } else {
        format!("{} written", summary.rows_written)
    };

    format!(
        "{} row(s) read, {} skipped, {} with progress; {outcome}",
        summary.rows_read, summary.rows_skipped, summary.rows_with_progress
    )
}
