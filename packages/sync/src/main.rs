#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the sheet sync job.
//!
//! ```text
//! sheet_sync [--dry-run] [--project NAME]
//! sheet_sync runs [--limit 20]
//! sheet_sync recordings
//! ```
//!
//! Settings are read from the environment (`GOOGLE_SHEET_ID`,
//! `GOOGLE_CREDENTIALS_FILE`, `GOOGLE_SHEET_TAB`, `SHEET_SYNC_DATABASE` and
//! their legacy aliases). Exits non-zero when a sync run fails.

use clap::{Args, Parser, Subcommand};
use sheet_sync::config::SyncConfig;
use sheet_sync::{SyncOptions, sync_sheet};
use sheet_sync_database::{recordings, runs};
use sheet_sync_sheet::google::GoogleSheetsClient;

#[derive(Parser)]
#[command(
    name = "sheet_sync",
    about = "Sync the RECORDING worksheet into the recordings staging table",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    sync: SyncArgs,
}

#[derive(Args)]
struct SyncArgs {
    /// Fetch and validate the worksheet without writing to staging
    #[arg(long)]
    dry_run: bool,

    /// Scope label stored on the run record
    #[arg(long)]
    project: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent sync runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: u64,
    },
    /// Show the current staging snapshot
    Recordings,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = SyncConfig::from_env();
    let conn = sheet_sync_database::open(&config.database_path)?;

    match cli.command {
        None => {
            let source = GoogleSheetsClient::new()?;
            let options = SyncOptions {
                dry_run: cli.sync.dry_run,
                project: cli.sync.project,
            };

            match sync_sheet(&conn, &source, &config, &options).await {
                Ok(record) => println!("{record}: {}", record.message),
                Err(e) => {
                    eprintln!("Sync failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Runs { limit }) => {
            let runs = runs::list_runs(&conn, limit)?;

            if runs.is_empty() {
                println!("No runs found.");
                return Ok(());
            }

            println!(
                "{:<38} {:<10} {:<8} {:<20} MESSAGE",
                "ID", "STATUS", "DRY RUN", "STARTED"
            );
            println!("{}", "-".repeat(100));

            for run in &runs {
                let detail = if run.errors.is_empty() {
                    &run.message
                } else {
                    &run.errors
                };
                println!(
                    "{:<38} {:<10} {:<8} {:<20} {}",
                    run.id.to_string(),
                    run.status.as_ref(),
                    if run.dry_run { "yes" } else { "no" },
                    run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    detail
                );
            }

            println!("\n{} run(s)", runs.len());
        }
        Some(Commands::Recordings) => {
            let rows = recordings::list_recordings(&conn)?;

            println!(
                "{:<10} {:<24} {:<24} {:>6} {:>8} {:>8}  STATUS",
                "SERIES", "COURSE", "SUBJECT", "HOURS", "LESSONS", "PERCENT"
            );
            println!("{}", "-".repeat(100));

            for row in &rows {
                println!(
                    "{:<10} {:<24} {:<24} {:>6} {:>8} {:>8}  {}",
                    row.series,
                    row.course,
                    row.subject,
                    row.scheduled_hours,
                    row.recorded_lessons,
                    row.percentage.to_string(),
                    row.recording_status
                );
            }

            println!("\n{} row(s)", rows.len());
        }
    }

    Ok(())
}
