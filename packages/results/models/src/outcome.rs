//! Batch outcome, discard reasons, and pipeline phases.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Coarse-grained pipeline phase reported to progress sinks.
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
pub enum Phase {
    Reading,
    Extracting,
    Validating,
    Persisting,
    Done,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: &[Self] = &[
        Self::Reading,
        Self::Extracting,
        Self::Validating,
        Self::Persisting,
        Self::Done,
    ];

    /// Zero-based position in [`Phase::ALL`].
    #[must_use]
    pub const fn step(self) -> u64 {
        self as u64
    }
}

/// The subject field that failed validation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvalidField {
    SubjectCode,
    SubjectName,
    Grade,
    Credits,
}

/// Why a row, record, or student was dropped from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscardReason {
    /// The row has no cell at the roll number position, or is not a cell
    /// sequence at all.
    MalformedRow,
    /// The roll number lacks the institutional roll marker.
    UnrecognizedIdentifier { identifier: String },
    /// A subject field failed validation.
    InvalidSubject {
        identifier: String,
        subject_code: String,
        field: InvalidField,
    },
    /// The subject was already seen for this student earlier in the
    /// document.
    DuplicateSubject {
        identifier: String,
        subject_code: String,
    },
    /// Persisting the student's merged record failed.
    PersistenceFailed { identifier: String, message: String },
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRow => f.write_str("malformed row"),
            Self::UnrecognizedIdentifier { identifier } => {
                write!(f, "unrecognized roll number {identifier:?}")
            }
            Self::InvalidSubject {
                identifier,
                subject_code,
                field,
            } => write!(
                f,
                "invalid {field} in subject {subject_code:?} for {identifier}"
            ),
            Self::DuplicateSubject {
                identifier,
                subject_code,
            } => write!(f, "duplicate subject {subject_code} for {identifier}"),
            Self::PersistenceFailed {
                identifier,
                message,
            } => write!(f, "failed to save {identifier}: {message}"),
        }
    }
}

/// A discarded row or student together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discard {
    /// Zero-based index into the document's row sequence. `None` for
    /// persistence failures, which concern a whole student.
    pub row: Option<usize>,
    pub reason: DiscardReason,
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {row}: {}", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Summary of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Accepted subject records.
    pub processed_count: u64,
    /// Discarded rows and records, for any reason.
    pub skipped_count: u64,
    /// Student records successfully merged into the store.
    pub saved_count: u64,
    /// `true` when at least one student record was saved.
    pub success: bool,
    /// Discards in the order they happened.
    pub errors: Vec<Discard>,
}

impl BatchOutcome {
    /// Returns `true` when some students were saved but others failed to
    /// persist.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.success
            && self
                .errors
                .iter()
                .any(|d| matches!(d.reason, DiscardReason::PersistenceFailed { .. }))
    }
}

/// What a single upsert did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// No record existed for the key before this upsert.
    pub created: bool,
    /// Subjects appended by this upsert.
    pub appended: usize,
}
