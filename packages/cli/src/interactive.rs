#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the marksheet CLI.
//!
//! Prompts with `dialoguer` so sheets can be ingested and results looked
//! up without memorizing flags.

use std::path::PathBuf;
use std::sync::Arc;

use dialoguer::{Input, Select};
use marksheet_cli_utils::MultiProgress;
use marksheet_extract::markers::Markers;
use marksheet_extract::store::StudentStore;

use crate::commands::{self, CliResult};

/// Top-level actions available in the interactive menu.
enum Action {
    IngestSheet,
    ShowStudent,
    PrintMarkers,
}

impl Action {
    const ALL: &[Self] = &[Self::IngestSheet, Self::ShowStudent, Self::PrintMarkers];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::IngestSheet => "Ingest a result sheet",
            Self::ShowStudent => "Show a student's results",
            Self::PrintMarkers => "Print default markers",
        }
    }
}

/// Runs the interactive menu against the default results database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, a prompt fails, or
/// the selected operation fails.
pub async fn run(multi: &MultiProgress) -> CliResult<()> {
    println!("Marksheet");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::IngestSheet => ingest_sheet(multi).await?,
        Action::ShowStudent => show_student().await?,
        Action::PrintMarkers => print!("{}", Markers::default().to_toml_string()?),
    }

    Ok(())
}

async fn ingest_sheet(multi: &MultiProgress) -> CliResult<()> {
    let file: String = Input::new()
        .with_prompt("Result sheet path")
        .interact_text()?;
    let semester: String = Input::new()
        .with_prompt("Semester (e.g., 1-1)")
        .interact_text()?;

    let store: Arc<dyn StudentStore> = commands::open_store(None)?;
    let reports = commands::ingest_files(
        multi,
        store,
        &Markers::default(),
        &[PathBuf::from(file.trim())],
        &semester,
    )
    .await?;

    print!("{}", commands::format_reports(&reports));
    Ok(())
}

async fn show_student() -> CliResult<()> {
    let roll: String = Input::new().with_prompt("Roll number").interact_text()?;
    let semester: String = Input::new()
        .with_prompt("Semester (empty for all)")
        .allow_empty(true)
        .interact_text()?;

    let store = commands::open_store(None)?;
    let records = commands::find_student(store.as_ref(), roll.trim(), Some(semester.as_str())).await?;

    if records.is_empty() {
        println!("No results stored for {}.", roll.trim());
    } else {
        print!("{}", commands::format_students(&records));
    }
    Ok(())
}
