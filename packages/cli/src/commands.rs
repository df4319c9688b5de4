//! Command implementations shared by the flag-driven and interactive modes.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use marksheet_cli_utils::{IndicatifProgress, MultiProgress};
use marksheet_database::{DbError, DuckDbStore};
use marksheet_extract::Extractor;
use marksheet_extract::jobs::{JobProgress, JobState, JobStore};
use marksheet_extract::markers::{Markers, MarkersError};
use marksheet_extract::progress::{FanOut, ProgressSink};
use marksheet_extract::store::StudentStore;
use marksheet_results_models::{Phase, Semester, StudentKey, StudentRecord};
use serde::Serialize;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Opens the results database at `db`, or the default location.
///
/// # Errors
///
/// Returns [`DbError`] if the database cannot be opened.
pub fn open_store(db: Option<&Path>) -> Result<Arc<DuckDbStore>, DbError> {
    let store = match db {
        Some(path) => DuckDbStore::open(path)?,
        None => DuckDbStore::open_default()?,
    };
    Ok(Arc::new(store))
}

/// Loads markers from `path`, or the built-in defaults.
///
/// # Errors
///
/// Returns [`MarkersError`] if the file cannot be read or parsed.
pub fn load_markers(path: Option<&Path>) -> Result<Markers, MarkersError> {
    path.map_or_else(|| Ok(Markers::default()), Markers::load)
}

/// Final state of one ingested file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    #[serde(flatten)]
    pub state: JobState,
}

impl FileReport {
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.state.error.is_some()
    }
}

/// Extracts each file in turn into `store`, tracking every file as a job.
///
/// A file that fails does not stop the remaining ones; its error is kept in
/// its report.
///
/// # Errors
///
/// Returns an error if `semester` is not a valid semester identifier.
pub async fn ingest_files(
    multi: &MultiProgress,
    store: Arc<dyn StudentStore>,
    markers: &Markers,
    files: &[PathBuf],
    semester: &str,
) -> CliResult<Vec<FileReport>> {
    let semester = Semester::parse(semester)?;
    let jobs = Arc::new(JobStore::new());
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let label = file.display().to_string();
        let id = jobs.create();
        let bar = IndicatifProgress::phases_bar(multi, &label);
        let progress = FanOut(vec![
            bar.clone(),
            Arc::new(JobProgress::new(Arc::clone(&jobs), id)),
        ]);

        let extractor = Extractor::new(Arc::clone(&store))
            .with_markers(markers.clone())
            .with_progress(Arc::new(progress));

        match tokio::fs::read(file).await {
            Ok(bytes) => {
                let result = extractor.extract(&bytes, semester.as_str()).await;
                if let Err(e) = &result {
                    log::error!("Failed to extract {label}: {e}");
                }
                jobs.finish(id, &result);
            }
            Err(e) => {
                log::error!("Failed to read {label}: {e}");
                jobs.fail(id, format!("Failed to read file: {e}"));
            }
        }
        bar.phase(Phase::Done);

        if let Some(state) = jobs.take_terminal(id) {
            reports.push(FileReport { file: label, state });
        }
    }

    Ok(reports)
}

/// Renders ingest reports as text.
#[must_use]
pub fn format_reports(reports: &[FileReport]) -> String {
    let mut out = String::new();

    for report in reports {
        if let Some(error) = &report.state.error {
            let _ = writeln!(out, "{}: failed: {error}", report.file);
            continue;
        }
        let Some(outcome) = &report.state.outcome else {
            continue;
        };

        let _ = writeln!(
            out,
            "{}: {} processed, {} skipped, {} saved{}",
            report.file,
            outcome.processed_count,
            outcome.skipped_count,
            outcome.saved_count,
            if outcome.is_partial() { " (partial)" } else { "" },
        );
        for discard in &outcome.errors {
            let _ = writeln!(out, "  {discard}");
        }
    }

    out
}

/// Looks up one roll number, optionally limited to one semester.
///
/// # Errors
///
/// Returns an error if the semester is invalid or the lookup fails.
pub async fn find_student(
    store: &dyn StudentStore,
    roll: &str,
    semester: Option<&str>,
) -> CliResult<Vec<StudentRecord>> {
    match semester.filter(|s| !s.trim().is_empty()) {
        Some(semester) => {
            let key = StudentKey::new(roll, Semester::parse(semester)?);
            Ok(store.find_by_key(&key).await?.into_iter().collect())
        }
        None => Ok(store.find_by_identifier(roll).await?),
    }
}

/// Renders stored records as text, one table per semester.
#[must_use]
pub fn format_students(records: &[StudentRecord]) -> String {
    let mut out = String::new();

    for record in records {
        let _ = writeln!(
            out,
            "{} (semester {})",
            record.key.identifier, record.key.semester
        );
        let _ = writeln!(
            out,
            "  {:<10} {:<32} {:>4} {:<6} {:>5} STATUS",
            "CODE", "NAME", "INT", "GRADE", "CR"
        );
        for subject in record.subjects() {
            let _ = writeln!(
                out,
                "  {:<10} {:<32} {:>4} {:<6} {:>5.1} {}",
                subject.subject_code,
                subject.subject_name,
                subject.internal_marks,
                subject.grade,
                subject.credits,
                subject.status,
            );
        }
    }

    out
}

/// Prints `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use marksheet_extract::store::MemoryStore;

    use super::*;

    fn sheet_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("marksheet_cli_{test}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_sheet(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn ingests_files_and_reports_each_one() {
        let store = Arc::new(MemoryStore::new());
        let dir = sheet_dir("ingest");
        let good = write_sheet(
            &dir,
            "good.csv",
            "SNO,HTNO,SUBCODE,SUBNAME,INT,GRADE,CR\n1,HN001,R101,Maths,45,A,4\n2,HN002,X999,Bad,50,B,3\n",
        );
        let missing = PathBuf::from("/nonexistent/results.pdf");

        let reports = ingest_files(
            &MultiProgress::new(),
            store.clone(),
            &Markers::default(),
            &[good, missing],
            "1-1",
        )
        .await;
        std::fs::remove_dir_all(&dir).ok();
        let reports = reports.unwrap();

        assert_eq!(reports.len(), 2);
        let outcome = reports[0].state.outcome.as_ref().unwrap();
        assert_eq!(outcome.processed_count, 1);
        assert_eq!(outcome.skipped_count, 1);
        assert!(reports[1].failed());
        assert_eq!(store.len().await, 1);

        let text = format_reports(&reports);
        assert!(text.contains("1 processed, 1 skipped, 1 saved"));
        assert!(text.contains("failed: Failed to read file"));
    }

    #[tokio::test]
    async fn invalid_semester_stops_before_any_file() {
        let result = ingest_files(
            &MultiProgress::new(),
            Arc::new(MemoryStore::new()),
            &Markers::default(),
            &[PathBuf::from("unused.csv")],
            "first semester",
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn shows_one_or_all_semesters() {
        let store = Arc::new(MemoryStore::new());
        let dir = sheet_dir("show");
        let sheet = write_sheet(
            &dir,
            "show.csv",
            "HTNO,SUBCODE,SUBNAME,INT,GRADE,CR\nHN007,R101,Maths,45,A,4\n",
        );
        let mut ingested = Vec::new();
        for semester in ["1-1", "1-2"] {
            ingested.push(
                ingest_files(
                    &MultiProgress::new(),
                    store.clone(),
                    &Markers::default(),
                    std::slice::from_ref(&sheet),
                    semester,
                )
                .await,
            );
        }
        std::fs::remove_dir_all(&dir).ok();
        for result in ingested {
            assert!(!result.unwrap()[0].failed());
        }

        let all = find_student(store.as_ref(), "HN007", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let one = find_student(store.as_ref(), "HN007", Some("1-2")).await.unwrap();
        assert_eq!(one.len(), 1);
        assert!(format_students(&one).contains("HN007 (semester 1-2)"));

        let blank = find_student(store.as_ref(), "HN007", Some(" ")).await.unwrap();
        assert_eq!(blank.len(), 2);
    }

    #[test]
    fn default_markers_load_without_a_file() {
        let markers = load_markers(None).unwrap();
        assert_eq!(markers, Markers::default());
    }
}
