//! JSON row-array reader.
//!
//! Table-extraction tools commonly emit a page's table as an array of rows,
//! each an array of cell values. `null` becomes an empty cell and numbers
//! keep their numeric type. A top-level element that is not an array is kept
//! as [`RawRow::Malformed`] so that it is counted rather than silently lost.

use marksheet_results_models::{Cell, RawRow};
use serde_json::Value;

use crate::{DocumentFormat, ReadError, TableReader};

/// Reads `[[cell, ...], ...]` JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTableReader;

fn to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Number(n) => n.as_f64().map_or_else(|| Cell::Text(n.to_string()), Cell::Number),
        Value::String(s) => Cell::from_text(s),
        other => Cell::Text(other.to_string()),
    }
}

impl TableReader for JsonTableReader {
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<RawRow>, ReadError> {
        let document: Value = serde_json::from_slice(bytes)?;

        let Value::Array(rows) = document else {
            return Err(ReadError::Shape(
                "expected a JSON array of rows".to_owned(),
            ));
        };

        let rows: Vec<RawRow> = rows
            .iter()
            .map(|row| match row {
                Value::Array(cells) => RawRow::Cells(cells.iter().map(to_cell).collect()),
                _ => RawRow::Malformed,
            })
            .collect();

        log::debug!("Parsed {} rows from JSON", rows.len());

        Ok(rows)
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Json
    }
}
