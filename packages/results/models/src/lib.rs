#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for semester result sheet ingestion.
//!
//! A result sheet arrives as a matrix of loosely-typed [`Cell`]s grouped into
//! [`RawRow`]s. The extraction pipeline resolves a [`ColumnLayout`] once per
//! document, turns usable rows into [`SubjectRecord`]s, and groups them into
//! [`StudentRecord`]s keyed by [`StudentKey`] (roll number + [`Semester`]).

pub mod outcome;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use outcome::{BatchOutcome, Discard, DiscardReason, InvalidField, MergeReport, Phase};

/// A single cell recovered from a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// No value at this position.
    Empty,
    /// A numeric value (JSON table dumps carry numbers natively).
    Number(f64),
    /// Any textual value.
    Text(String),
}

impl Cell {
    /// Builds a cell from extracted text. Whitespace-only text is
    /// [`Cell::Empty`].
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(text.to_owned())
        }
    }

    /// Renders the cell as text: empty cells become `""` and numbers use
    /// their shortest decimal form (`45`, not `45.0`).
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Returns `true` for [`Cell::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One row of a document's cell matrix, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawRow {
    /// An ordered sequence of cells.
    Cells(Vec<Cell>),
    /// Something the reader could not interpret as a cell sequence.
    Malformed,
}

impl RawRow {
    /// Convenience constructor for text-only rows.
    #[must_use]
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::Cells(texts.iter().map(|t| Cell::from_text(t.as_ref())).collect())
    }

    /// Returns the cells, or `None` for a malformed row.
    #[must_use]
    pub fn cells(&self) -> Option<&[Cell]> {
        match self {
            Self::Cells(cells) => Some(cells),
            Self::Malformed => None,
        }
    }
}

/// Header position and column-offset convention for one document.
///
/// Produced once by header detection and passed to every row extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLayout {
    /// Index of the header row in the document's row sequence.
    pub header_row_index: usize,
    /// Whether data rows begin with a serial-number column.
    pub has_leading_serial: bool,
}

impl ColumnLayout {
    /// Number of leading cells to skip before the roll number column.
    #[must_use]
    pub const fn offset(&self) -> usize {
        if self.has_leading_serial { 1 } else { 0 }
    }

    /// Index of the first data row.
    #[must_use]
    pub const fn first_data_row(&self) -> usize {
        self.header_row_index + 1
    }
}

/// Pass/fail status of a subject, derived from the grade.
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
pub enum SubjectStatus {
    /// Any grade outside the failing set.
    Pass,
    /// Absent, failed, or malpractice.
    Fail,
}

/// One subject result for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub subject_code: String,
    pub subject_name: String,
    pub internal_marks: i64,
    pub grade: String,
    pub credits: f64,
    pub status: SubjectStatus,
}

/// Error returned when a semester identifier is empty or contains
/// whitespace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid semester {value:?}: expected e.g. \"1-2\"")]
pub struct InvalidSemesterError {
    /// The rejected input.
    pub value: String,
}

/// A validated semester identifier such as `"1-2"` (year 1, semester 2).
///
/// Underscores are normalized to dashes so `"1_2"` and `"1-2"` name the
/// same semester.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Semester(String);

impl Semester {
    /// Parses and normalizes a semester identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSemesterError`] if the trimmed input is empty or
    /// contains whitespace.
    pub fn parse(value: &str) -> Result<Self, InvalidSemesterError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(InvalidSemesterError {
                value: value.to_owned(),
            });
        }
        Ok(Self(trimmed.replace('_', "-")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Semester {
    type Error = InvalidSemesterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Semester> for String {
    fn from(value: Semester) -> Self {
        value.0
    }
}

/// Composite identity used to target upserts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentKey {
    /// Roll / hall-ticket number.
    pub identifier: String,
    pub semester: Semester,
}

impl StudentKey {
    #[must_use]
    pub fn new(identifier: impl Into<String>, semester: Semester) -> Self {
        Self {
            identifier: identifier.into(),
            semester,
        }
    }
}

impl fmt::Display for StudentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identifier, self.semester)
    }
}

/// A student's subjects for one semester.
///
/// Subjects keep insertion order and are unique by subject code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StudentRecordFields")]
pub struct StudentRecord {
    pub key: StudentKey,
    subjects: Vec<SubjectRecord>,
}

/// Wire shape of a [`StudentRecord`]. Subjects are re-added one by one on
/// conversion so repeated codes collapse to the first occurrence.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentRecordFields {
    key: StudentKey,
    subjects: Vec<SubjectRecord>,
}

impl From<StudentRecordFields> for StudentRecord {
    fn from(fields: StudentRecordFields) -> Self {
        let mut record = Self::new(fields.key);
        for subject in fields.subjects {
            record.push_subject(subject);
        }
        record
    }
}

impl StudentRecord {
    #[must_use]
    pub const fn new(key: StudentKey) -> Self {
        Self {
            key,
            subjects: Vec::new(),
        }
    }

    #[must_use]
    pub fn subjects(&self) -> &[SubjectRecord] {
        &self.subjects
    }

    #[must_use]
    pub fn has_subject(&self, subject_code: &str) -> bool {
        self.subjects.iter().any(|s| s.subject_code == subject_code)
    }

    /// Appends `subject` unless a subject with the same code is already
    /// present. Returns whether it was appended.
    pub fn push_subject(&mut self, subject: SubjectRecord) -> bool {
        if self.has_subject(&subject.subject_code) {
            return false;
        }
        self.subjects.push(subject);
        true
    }

    /// Set-union merge on subject code: appends every subject of `other`
    /// whose code is not already present, keeping existing entries
    /// untouched. Returns the number of subjects appended.
    pub fn merge_from(&mut self, other: &Self) -> usize {
        let mut known: BTreeSet<String> = self
            .subjects
            .iter()
            .map(|s| s.subject_code.clone())
            .collect();
        let mut appended = 0;

        for subject in &other.subjects {
            if known.insert(subject.subject_code.clone()) {
                self.subjects.push(subject.clone());
                appended += 1;
            }
        }

        appended
    }

    /// Returns the subject codes in stored order.
    #[must_use]
    pub fn subject_codes(&self) -> Vec<&str> {
        self.subjects
            .iter()
            .map(|s| s.subject_code.as_str())
            .collect()
    }
}
