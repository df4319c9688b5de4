//! Row classification and field extraction.
//!
//! Columns are read at fixed positions relative to the layout offset:
//!
//! | position | field |
//! |---|---|
//! | `offset + 0` | roll number |
//! | `offset + 1` | subject code |
//! | `offset + 2` | subject name |
//! | `offset + 3` | internal marks |
//! | `offset + 4` | grade |
//! | `offset + 5` | credits |
//!
//! Unparseable marks and credits default to zero instead of rejecting the
//! row: scanned sheets often carry stray characters in numeric columns.

use std::sync::LazyLock;

use marksheet_results_models::{
    Cell, ColumnLayout, DiscardReason, RawRow, SubjectRecord, SubjectStatus,
};
use regex::Regex;

use crate::markers::Markers;

static LEADING_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+").expect("integer pattern is valid"));

static LEADING_FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
        .expect("float pattern is valid")
});

/// A subject record extracted from one row, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Roll number the subject belongs to.
    pub identifier: String,
    pub subject: SubjectRecord,
}

/// Parses the leading integer of `text`, ignoring trailing characters.
///
/// `"45abc"` gives 45 and `"4.7"` gives 4. Returns `None` when the text
/// does not start with digits.
#[must_use]
pub fn parse_leading_int(text: &str) -> Option<i64> {
    LEADING_INT
        .find(text.trim())
        .and_then(|m| m.as_str().parse().ok())
}

/// Parses the leading decimal literal of `text`, ignoring trailing
/// characters (`"3.5 cr"` gives 3.5).
#[must_use]
pub fn parse_leading_float(text: &str) -> Option<f64> {
    LEADING_FLOAT
        .find(text.trim())
        .and_then(|m| m.as_str().parse().ok())
}

#[allow(clippy::cast_possible_truncation)]
fn int_cell(cell: Option<&Cell>) -> i64 {
    match cell {
        Some(Cell::Number(n)) if n.is_finite() => n.trunc() as i64,
        Some(Cell::Text(s)) => parse_leading_int(s).unwrap_or(0),
        _ => 0,
    }
}

fn float_cell(cell: Option<&Cell>) -> f64 {
    match cell {
        Some(Cell::Number(n)) => *n,
        Some(Cell::Text(s)) => parse_leading_float(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn text_cell(cell: Option<&Cell>) -> String {
    cell.map(|c| c.text().trim().to_owned()).unwrap_or_default()
}

/// Derives pass/fail from an upper-cased grade.
#[must_use]
pub fn derive_status(upper_grade: &str, markers: &Markers) -> SubjectStatus {
    if markers.is_failing_grade(upper_grade) {
        SubjectStatus::Fail
    } else {
        SubjectStatus::Pass
    }
}

/// Extracts a candidate subject from a data row.
///
/// # Errors
///
/// Returns [`DiscardReason::MalformedRow`] when the row is not a cell
/// sequence or has no cell at the roll number position, and
/// [`DiscardReason::UnrecognizedIdentifier`] when the roll number lacks the
/// roll marker.
pub fn extract_row(
    row: &RawRow,
    layout: ColumnLayout,
    markers: &Markers,
) -> Result<Candidate, DiscardReason> {
    let cells = row.cells().ok_or(DiscardReason::MalformedRow)?;
    let offset = layout.offset();
    let field = |i: usize| cells.get(offset + i);

    let identifier = field(0)
        .map(|c| c.text().trim().to_owned())
        .ok_or(DiscardReason::MalformedRow)?;

    if !markers.is_roll(&identifier) {
        return Err(DiscardReason::UnrecognizedIdentifier { identifier });
    }

    let grade = text_cell(field(4)).to_uppercase();
    let status = derive_status(&grade, markers);

    Ok(Candidate {
        identifier,
        subject: SubjectRecord {
            subject_code: text_cell(field(1)),
            subject_name: text_cell(field(2)),
            internal_marks: int_cell(field(3)),
            grade,
            credits: float_cell(field(5)),
            status,
        },
    })
}
