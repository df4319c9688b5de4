#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for semester result extraction.
//!
//! Run without a subcommand for an interactive menu. Uses
//! `indicatif-log-bridge` (via [`marksheet_cli_utils::init_logger`]) so
//! that log lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use marksheet_extract::store::StudentStore;

use crate::commands::CliResult;

#[derive(Parser)]
#[command(name = "marksheet", about = "Semester result sheet extraction")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one or more result sheets (PDF, CSV, or JSON) into the
    /// results database
    Ingest {
        /// Result sheet files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Semester the sheets belong to (e.g., "1-1", "3-2")
        #[arg(long)]
        semester: String,
        /// Database file (overrides `MARKSHEET_DB`)
        #[arg(long)]
        db: Option<PathBuf>,
        /// TOML file overriding header, roll, and grade markers
        #[arg(long)]
        markers: Option<PathBuf>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show stored results for a roll number
    Show {
        /// Roll number (e.g., "21HN1A0501")
        roll: String,
        /// Only show this semester
        #[arg(long)]
        semester: Option<String>,
        /// Database file (overrides `MARKSHEET_DB`)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective markers as TOML
    Markers {
        /// TOML file overriding the defaults
        #[arg(long)]
        markers: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let multi = marksheet_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Ingest {
            files,
            semester,
            db,
            markers,
            json,
        } => {
            let markers = commands::load_markers(markers.as_deref())?;
            let store: Arc<dyn StudentStore> = commands::open_store(db.as_deref())?;

            let reports = commands::ingest_files(&multi, store, &markers, &files, &semester).await?;

            if json {
                commands::print_json(&reports)?;
            } else {
                print!("{}", commands::format_reports(&reports));
            }

            let failed = reports.iter().filter(|r| r.failed()).count();
            if failed > 0 {
                return Err(format!("{failed} of {} file(s) failed", reports.len()).into());
            }
        }
        Commands::Show {
            roll,
            semester,
            db,
            json,
        } => {
            let store = commands::open_store(db.as_deref())?;
            let records = commands::find_student(store.as_ref(), &roll, semester.as_deref()).await?;

            if json {
                commands::print_json(&records)?;
            } else if records.is_empty() {
                return Err(format!("No results stored for {roll}").into());
            } else {
                print!("{}", commands::format_students(&records));
            }
        }
        Commands::Markers { markers } => {
            let markers = commands::load_markers(markers.as_deref())?;
            print!("{}", markers.to_toml_string()?);
        }
    }

    Ok(())
}
