//! Delimited-text result sheet reader.
//!
//! Unlike a typical CSV import, the first line is not treated as column
//! headers: result exports often carry title lines above the real header,
//! so every record is returned as a row.

use marksheet_results_models::{Cell, RawRow};

use crate::{DocumentFormat, ReadError, TableReader};

/// Reads comma (or otherwise) delimited result sheets.
#[derive(Debug, Clone, Copy)]
pub struct CsvTableReader {
    delimiter: u8,
}

impl CsvTableReader {
    /// Creates a comma-delimited reader.
    #[must_use]
    pub const fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Sets the field delimiter (e.g. `b'\t'` for TSV exports).
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Default for CsvTableReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableReader for CsvTableReader {
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<RawRow>, ReadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result?;
            rows.push(RawRow::Cells(record.iter().map(Cell::from_text).collect()));
        }

        log::debug!("Parsed {} rows from CSV", rows.len());

        Ok(rows)
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Csv
    }
}
