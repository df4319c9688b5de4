//! Header row detection.
//!
//! Result sheets open with titles, university letterheads and legends of
//! varying length, so the table start is found by content rather than
//! position: the first row with a roll or subject-code header cell.

use marksheet_results_models::{ColumnLayout, RawRow};

use crate::markers::Markers;

/// Finds the header row and resolves the column layout.
///
/// Cells are compared case-insensitively against the header tokens in
/// `markers`. The layout has a leading serial column when the header row's
/// first cell is a serial token or contains the serial substring.
///
/// Returns `None` when no row qualifies.
#[must_use]
pub fn locate_header(rows: &[RawRow], markers: &Markers) -> Option<ColumnLayout> {
    for (index, row) in rows.iter().enumerate() {
        let Some(cells) = row.cells() else {
            continue;
        };

        let lowered: Vec<String> = cells.iter().map(|c| c.text().to_lowercase()).collect();

        if lowered.iter().any(|cell| markers.is_header_cell(cell)) {
            let has_leading_serial = lowered
                .first()
                .is_some_and(|first| markers.is_serial_cell(first.trim()));

            log::info!("Header found at row {index} (serial column: {has_leading_serial})");

            return Some(ColumnLayout {
                header_row_index: index,
                has_leading_serial,
            });
        }
    }

    log::warn!("No header row found in {} rows", rows.len());
    None
}
