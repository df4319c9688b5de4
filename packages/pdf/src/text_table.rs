//! Gutter-based table splitting of extracted PDF text.
//!
//! Typeset result sheets lose their cell borders when flattened to text, but
//! columns stay separated by wide gutters. Each non-empty line becomes one
//! row, split on tabs or on runs of two or more spaces. Single spaces are
//! kept so multi-word subject names survive as one cell.

use std::sync::LazyLock;

use marksheet_results_models::{Cell, RawRow};
use regex::Regex;

static GUTTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+| {2,}").expect("gutter pattern is valid"));

/// Splits one line of text into cells.
#[must_use]
pub fn split_cells(line: &str) -> Vec<Cell> {
    GUTTER
        .split(line.trim())
        .map(|part| Cell::from_text(part.trim()))
        .collect()
}

/// Converts extracted text into rows, skipping blank lines.
#[must_use]
pub fn rows_from_text(text: &str) -> Vec<RawRow> {
    let rows: Vec<RawRow> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| RawRow::Cells(split_cells(line)))
        .collect();

    log::debug!("Split text into {} rows", rows.len());

    rows
}
