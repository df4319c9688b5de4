#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cell matrix readers for result sheet documents.
//!
//! Result sheets reach the pipeline as opaque bytes. A [`TableReader`] turns
//! them into [`RawRow`]s without interpreting any column: header detection
//! and field extraction are the caller's job.
//!
//! Three readers are provided:
//! - [`PdfTableReader`]: pure-Rust text extraction ([`pdf_extract`]) split
//!   into cells on column gutters ([`text_table`])
//! - [`CsvTableReader`]: delimited text exports ([`csv_rows`])
//! - [`JsonTableReader`]: arrays of rows emitted by table-extraction tools
//!   ([`json_rows`])
//!
//! [`DocumentFormat::sniff`] picks one from the leading bytes.

pub mod csv_rows;
pub mod json_rows;
pub mod text_table;

use marksheet_results_models::RawRow;

pub use csv_rows::CsvTableReader;
pub use json_rows::JsonTableReader;

/// Errors raised while turning document bytes into rows.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The document contained no bytes.
    #[error("document is empty")]
    Empty,

    /// PDF text extraction failed.
    #[error("PDF extraction error: {0}")]
    Pdf(String),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but does not have a row structure.
    #[error("Unexpected document shape: {0}")]
    Shape(String),
}

/// Document encodings the readers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Csv,
    Json,
}

impl DocumentFormat {
    /// Guesses the format from the leading bytes: the `%PDF` magic means
    /// PDF, a leading `[` (after whitespace) means JSON, anything else is
    /// treated as CSV.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF") {
            return Self::Pdf;
        }
        match bytes.iter().copied().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') => Self::Json,
            _ => Self::Csv,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Turns document bytes into a sequence of rows.
pub trait TableReader: Send + Sync {
    /// Reads every row of the document in reading order.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError`] if the bytes cannot be parsed into rows.
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<RawRow>, ReadError>;

    /// The format this reader handles.
    fn format(&self) -> DocumentFormat;
}

/// Reads typeset PDF result sheets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTableReader;

impl TableReader for PdfTableReader {
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<RawRow>, ReadError> {
        if bytes.is_empty() {
            return Err(ReadError::Empty);
        }

        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ReadError::Pdf(format!("failed to extract text from PDF: {e}")))?;

        log::debug!(
            "Extracted {} characters of text from {} byte PDF",
            text.len(),
            bytes.len()
        );

        Ok(text_table::rows_from_text(&text))
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }
}

/// Returns the default reader for `format`.
#[must_use]
pub fn reader_for(format: DocumentFormat) -> Box<dyn TableReader> {
    match format {
        DocumentFormat::Pdf => Box::new(PdfTableReader),
        DocumentFormat::Csv => Box::new(CsvTableReader::new()),
        DocumentFormat::Json => Box::new(JsonTableReader),
    }
}

/// Sniffs the format of `bytes` and reads them with the matching reader.
///
/// # Errors
///
/// Returns [`ReadError`] if the selected reader fails.
pub fn read_document(bytes: &[u8]) -> Result<Vec<RawRow>, ReadError> {
    if bytes.is_empty() {
        return Err(ReadError::Empty);
    }
    let format = DocumentFormat::sniff(bytes);
    log::debug!("Reading document as {}", format.name());
    reader_for(format).read_rows(bytes)
}
