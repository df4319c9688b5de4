#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Extraction of semester result sheets into student records.
//!
//! The pipeline runs in five coarse phases:
//!
//! 1. **Reading**: document bytes become [`RawRow`]s ([`marksheet_pdf`])
//! 2. **Extracting**: the header row fixes a [`ColumnLayout`]
//!    ([`header`]) and every later row becomes a candidate subject or a
//!    discard ([`row`])
//! 3. **Validating**: candidates are checked ([`validate`]) and grouped by
//!    student, dropping repeated subject codes ([`aggregate`])
//! 4. **Persisting**: each student is merged into a [`StudentStore`]
//!    independently ([`store`])
//! 5. **Done**: counts are reported as a [`BatchOutcome`] ([`outcome`])
//!
//! Row-level problems never abort a batch; they are counted and listed in
//! [`BatchOutcome::errors`]. Only an unreadable document, a missing header,
//! or a document yielding no students fail the whole run.

pub mod aggregate;
pub mod header;
pub mod jobs;
pub mod markers;
pub mod outcome;
pub mod progress;
pub mod row;
pub mod store;
pub mod validate;

use std::sync::Arc;

use marksheet_pdf::{ReadError, TableReader};
use marksheet_results_models::{
    BatchOutcome, ColumnLayout, DiscardReason, InvalidSemesterError, Phase, RawRow, Semester,
    StudentRecord,
};

use crate::aggregate::Aggregator;
use crate::markers::Markers;
use crate::outcome::OutcomeReporter;
use crate::progress::{ProgressSink, null_progress};
use crate::row::Candidate;
use crate::store::StudentStore;

/// Failures that abort a whole extraction run.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The semester identifier was rejected.
    #[error(transparent)]
    InvalidSemester(#[from] InvalidSemesterError),

    /// The document bytes could not be turned into rows.
    #[error("Document unreadable: {0}")]
    DocumentUnreadable(#[from] ReadError),

    /// No row carries a roll or subject-code header.
    #[error("Invalid document format: no header row found")]
    NoHeaderFound,

    /// The document had a header but no usable student rows.
    #[error("No valid results found ({skipped} rows skipped)")]
    NoValidResults {
        /// Rows discarded before giving up.
        skipped: u64,
    },
}

/// Runs result sheets through the extraction pipeline into a store.
pub struct Extractor {
    store: Arc<dyn StudentStore>,
    markers: Markers,
    reader: Option<Box<dyn TableReader>>,
    progress: Arc<dyn ProgressSink>,
}

impl Extractor {
    /// Creates an extractor with default markers, format sniffing, and no
    /// progress reporting.
    #[must_use]
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self {
            store,
            markers: Markers::default(),
            reader: None,
            progress: null_progress(),
        }
    }

    #[must_use]
    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers.normalized();
        self
    }

    /// Forces a specific reader instead of sniffing each document.
    #[must_use]
    pub fn with_reader(mut self, reader: Box<dyn TableReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Extracts a document's results for `semester` and merges them into the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the semester is invalid, the document
    /// cannot be read, it has no header row, or it yields no students.
    pub async fn extract(&self, bytes: &[u8], semester: &str) -> Result<BatchOutcome, ExtractError> {
        let semester = Semester::parse(semester)?;

        self.progress.phase(Phase::Reading);
        let rows = match &self.reader {
            Some(reader) => reader.read_rows(bytes)?,
            None => marksheet_pdf::read_document(bytes)?,
        };
        log::info!("Read {} rows for semester {semester}", rows.len());

        self.run(&rows, semester).await
    }

    /// Runs the pipeline on rows already produced by a reader.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the semester is invalid, the rows have no
    /// header, or they yield no students.
    pub async fn extract_rows(
        &self,
        rows: &[RawRow],
        semester: &str,
    ) -> Result<BatchOutcome, ExtractError> {
        let semester = Semester::parse(semester)?;
        self.run(rows, semester).await
    }

    async fn run(&self, rows: &[RawRow], semester: Semester) -> Result<BatchOutcome, ExtractError> {
        self.progress.phase(Phase::Extracting);
        let layout = header::locate_header(rows, &self.markers).ok_or(ExtractError::NoHeaderFound)?;
        let candidates = self.extract_candidates(rows, layout);

        self.progress.phase(Phase::Validating);
        let mut reporter = OutcomeReporter::new();
        let records = self.aggregate(candidates, semester, &mut reporter);

        if records.is_empty() {
            self.progress.phase(Phase::Done);
            return Err(ExtractError::NoValidResults {
                skipped: reporter.skipped_count(),
            });
        }

        self.progress.phase(Phase::Persisting);
        persist_all(self.store.as_ref(), &records, &mut reporter).await;

        let outcome = reporter.finish();
        self.progress.phase(Phase::Done);

        log::info!(
            "Extraction complete: {} processed, {} skipped, {} saved",
            outcome.processed_count,
            outcome.skipped_count,
            outcome.saved_count
        );

        Ok(outcome)
    }

    /// Classifies every row after the header. Rows have no cross-row
    /// dependency once the layout is fixed.
    fn extract_candidates(
        &self,
        rows: &[RawRow],
        layout: ColumnLayout,
    ) -> Vec<(usize, Result<Candidate, DiscardReason>)> {
        rows.iter()
            .enumerate()
            .skip(layout.first_data_row())
            .map(|(index, row)| (index, row::extract_row(row, layout, &self.markers)))
            .collect()
    }

    /// Validates candidates in document order and groups the accepted ones
    /// by student.
    fn aggregate(
        &self,
        candidates: Vec<(usize, Result<Candidate, DiscardReason>)>,
        semester: Semester,
        reporter: &mut OutcomeReporter,
    ) -> Vec<StudentRecord> {
        let mut aggregator = Aggregator::new(semester);

        for (index, candidate) in candidates {
            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(reason) => {
                    reporter.skipped(index, reason);
                    continue;
                }
            };

            if let Err(field) = validate::validate_subject(&candidate.subject, &self.markers) {
                reporter.skipped(
                    index,
                    DiscardReason::InvalidSubject {
                        identifier: candidate.identifier,
                        subject_code: candidate.subject.subject_code,
                        field,
                    },
                );
                continue;
            }

            match aggregator.add(&candidate.identifier, candidate.subject) {
                Ok(()) => reporter.accepted(),
                Err(reason) => reporter.skipped(index, reason),
            }
        }

        log::debug!("Aggregated {} students", aggregator.len());

        aggregator.into_records()
    }
}

/// Merges every record into `store`, one student at a time. A failed
/// student is reported and the rest still persist.
pub async fn persist_all(
    store: &dyn StudentStore,
    records: &[StudentRecord],
    reporter: &mut OutcomeReporter,
) {
    for record in records {
        match store.upsert_merge(record).await {
            Ok(report) => {
                log::debug!(
                    "Saved {} (created: {}, appended: {})",
                    record.key,
                    report.created,
                    report.appended
                );
                reporter.saved();
            }
            Err(e) => reporter.persist_failed(&record.key.identifier, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use marksheet_results_models::{MergeReport, StudentKey};

    use super::*;
    use crate::store::{MemoryStore, StoreError};

    fn sheet() -> Vec<RawRow> {
        vec![
            RawRow::from_texts(&["SNO", "HTNO", "SUBCODE", "SUBNAME", "INT", "GRADE", "CR"]),
            RawRow::from_texts(&["1", "HN001", "R101", "Maths", "45", "A", "4"]),
            RawRow::from_texts(&["2", "HN002", "X999", "Bad", "50", "B", "3"]),
        ]
    }

    fn key(roll: &str, semester: &str) -> StudentKey {
        StudentKey::new(roll, Semester::parse(semester).unwrap())
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<Phase>>,
    }

    impl ProgressSink for RecordingProgress {
        fn phase(&self, phase: Phase) {
            self.phases.lock().unwrap().push(phase);
        }
    }

    /// Refuses to store one roll number.
    struct FlakyStore {
        inner: MemoryStore,
        broken_roll: &'static str,
    }

    #[async_trait]
    impl StudentStore for FlakyStore {
        async fn find_by_key(
            &self,
            key: &StudentKey,
        ) -> Result<Option<StudentRecord>, StoreError> {
            self.inner.find_by_key(key).await
        }

        async fn upsert_merge(&self, record: &StudentRecord) -> Result<MergeReport, StoreError> {
            if record.key.identifier == self.broken_roll {
                return Err(StoreError::Unavailable("connection reset".to_owned()));
            }
            self.inner.upsert_merge(record).await
        }

        async fn find_by_identifier(
            &self,
            identifier: &str,
        ) -> Result<Vec<StudentRecord>, StoreError> {
            self.inner.find_by_identifier(identifier).await
        }
    }

    #[tokio::test]
    async fn accepts_prefixed_subject_and_skips_the_rest() {
        let store = Arc::new(MemoryStore::new());
        let extractor = Extractor::new(store.clone());

        let outcome = extractor.extract_rows(&sheet(), "1-2").await.unwrap();

        assert_eq!(outcome.processed_count, 1);
        assert_eq!(outcome.skipped_count, 1);
        assert_eq!(outcome.saved_count, 1);
        assert!(outcome.success);
        assert_eq!(outcome.errors[0].row, Some(2));
        assert!(matches!(
            outcome.errors[0].reason,
            DiscardReason::InvalidSubject { ref subject_code, .. } if subject_code == "X999"
        ));

        let stored = store.find_by_key(&key("HN001", "1-2")).await.unwrap().unwrap();
        assert_eq!(stored.subject_codes(), vec!["R101"]);
        assert!(store.find_by_key(&key("HN002", "1-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_subject_in_one_document_is_skipped() {
        let mut rows = sheet();
        rows.push(RawRow::from_texts(&["3", "HN001", "R101", "Maths", "10", "F", "4"]));

        let store = Arc::new(MemoryStore::new());
        let outcome = Extractor::new(store.clone())
            .extract_rows(&rows, "1-2")
            .await
            .unwrap();

        assert_eq!(outcome.processed_count, 1);
        assert_eq!(outcome.skipped_count, 2);
        assert!(matches!(
            outcome.errors[1].reason,
            DiscardReason::DuplicateSubject { .. }
        ));

        let stored = store.find_by_key(&key("HN001", "1-2")).await.unwrap().unwrap();
        assert_eq!(stored.subjects()[0].grade, "A");
    }

    #[tokio::test]
    async fn missing_header_fails_before_classifying_rows() {
        let rows = vec![
            RawRow::from_texts(&["1", "HN001", "R101", "Maths", "45", "A", "4"]),
            RawRow::from_texts(&["Name", "Code"]),
        ];
        let progress = Arc::new(RecordingProgress::default());
        let extractor = Extractor::new(Arc::new(MemoryStore::new())).with_progress(progress.clone());

        let result = extractor.extract_rows(&rows, "1-2").await;

        assert!(matches!(result, Err(ExtractError::NoHeaderFound)));
        assert_eq!(*progress.phases.lock().unwrap(), vec![Phase::Extracting]);
    }

    #[tokio::test]
    async fn header_without_students_is_no_valid_results() {
        let rows = vec![
            RawRow::from_texts(&["Htno", "Subcode", "Subname", "Int", "Grade", "Cr"]),
            RawRow::from_texts(&["Page 1 of 1"]),
            RawRow::from_texts(&["XX01", "R101", "Maths", "45", "A", "4"]),
        ];
        let store = Arc::new(MemoryStore::new());

        let result = Extractor::new(store.clone()).extract_rows(&rows, "1-2").await;

        assert!(matches!(
            result,
            Err(ExtractError::NoValidResults { skipped: 2 })
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn rerunning_the_same_document_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let extractor = Extractor::new(store.clone());

        extractor.extract_rows(&sheet(), "1-2").await.unwrap();
        let second = extractor.extract_rows(&sheet(), "1-2").await.unwrap();

        assert_eq!(second.saved_count, 1);
        assert_eq!(store.len().await, 1);
        let stored = store.find_by_key(&key("HN001", "1-2")).await.unwrap().unwrap();
        assert_eq!(stored.subject_codes(), vec!["R101"]);
    }

    #[tokio::test]
    async fn new_subjects_extend_a_stored_record() {
        let store = Arc::new(MemoryStore::new());
        let extractor = Extractor::new(store.clone());
        extractor.extract_rows(&sheet(), "1-2").await.unwrap();

        let rows = vec![
            RawRow::from_texts(&["Htno", "Subcode", "Subname", "Int", "Grade", "Cr"]),
            RawRow::from_texts(&["HN001", "R101", "Maths", "45", "A", "4"]),
            RawRow::from_texts(&["HN001", "R102", "Physics", "38", "B", "3"]),
        ];
        let outcome = extractor.extract_rows(&rows, "1_2").await.unwrap();

        assert_eq!(outcome.processed_count, 2);
        let stored = store.find_by_key(&key("HN001", "1-2")).await.unwrap().unwrap();
        assert_eq!(stored.subject_codes(), vec!["R101", "R102"]);
    }

    #[tokio::test]
    async fn one_failing_student_does_not_block_the_others() {
        let rows = vec![
            RawRow::from_texts(&["Htno", "Subcode", "Subname", "Int", "Grade", "Cr"]),
            RawRow::from_texts(&["HN001", "R101", "Maths", "45", "A", "4"]),
            RawRow::from_texts(&["HN002", "R101", "Maths", "30", "C", "4"]),
        ];
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            broken_roll: "HN001",
        });

        let outcome = Extractor::new(store.clone()).extract_rows(&rows, "1-2").await.unwrap();

        assert!(outcome.success);
        assert!(outcome.is_partial());
        assert_eq!(outcome.saved_count, 1);
        assert_eq!(outcome.processed_count, 2);
        assert!(store.find_by_key(&key("HN002", "1-2")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn every_student_failing_is_reported_not_raised() {
        let rows = vec![
            RawRow::from_texts(&["Htno", "Subcode", "Subname", "Int", "Grade", "Cr"]),
            RawRow::from_texts(&["HN001", "R101", "Maths", "45", "A", "4"]),
        ];
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            broken_roll: "HN001",
        });

        let outcome = Extractor::new(store).extract_rows(&rows, "1-2").await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.saved_count, 0);
        assert!(matches!(
            outcome.errors[0].reason,
            DiscardReason::PersistenceFailed { .. }
        ));
    }

    #[tokio::test]
    async fn reports_phases_in_order() {
        let progress = Arc::new(RecordingProgress::default());
        let extractor =
            Extractor::new(Arc::new(MemoryStore::new())).with_progress(progress.clone());

        extractor
            .extract(b"Htno,Subcode,Subname,Int,Grade,Cr\nHN001,R101,Maths,45,A,4\n", "1-2")
            .await
            .unwrap();

        assert_eq!(*progress.phases.lock().unwrap(), Phase::ALL.to_vec());
    }

    #[tokio::test]
    async fn invalid_semester_is_rejected_before_reading() {
        let extractor = Extractor::new(Arc::new(MemoryStore::new()));
        let result = extractor.extract(b"irrelevant", "  ").await;
        assert!(matches!(result, Err(ExtractError::InvalidSemester(_))));
    }

    #[tokio::test]
    async fn unreadable_document_is_fatal() {
        let extractor = Extractor::new(Arc::new(MemoryStore::new()));
        let result = extractor.extract(b"[[\"Htno\"", "1-2").await;
        assert!(matches!(result, Err(ExtractError::DocumentUnreadable(_))));
    }

    #[tokio::test]
    async fn custom_markers_change_what_is_accepted() {
        let markers = Markers::from_toml_str("roll_marker = \"JN\"\nsubject_prefix = \"A\"").unwrap();
        let store = Arc::new(MemoryStore::new());
        let rows = vec![
            RawRow::from_texts(&["Htno", "Subcode", "Subname", "Int", "Grade", "Cr"]),
            RawRow::from_texts(&["21JN1A0501", "A101", "Maths", "45", "A", "4"]),
            RawRow::from_texts(&["21HN1A0501", "R101", "Maths", "45", "A", "4"]),
        ];

        let outcome = Extractor::new(store)
            .with_markers(markers)
            .extract_rows(&rows, "2-2")
            .await
            .unwrap();

        assert_eq!(outcome.processed_count, 1);
        assert_eq!(outcome.skipped_count, 1);
    }
}
