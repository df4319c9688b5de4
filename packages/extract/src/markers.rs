//! Institutional markers: the fixed text conventions that identify a result
//! sheet's header row, its roll numbers, subject codes, and failing grades.
//!
//! Defaults match the university's published sheets. A TOML file can
//! override any subset of them; missing keys keep their default.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading a markers file.
#[derive(Debug, thiserror::Error)]
pub enum MarkersError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid markers TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to render markers TOML: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Text conventions used to recognise and validate result sheet content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Header cell substrings (lower-case) marking the roll number column.
    pub roll_header_tokens: Vec<String>,
    /// Header cell substrings (lower-case) marking the subject code column.
    pub subject_header_tokens: Vec<String>,
    /// Exact first-cell values (lower-case) marking a serial column.
    pub serial_tokens: Vec<String>,
    /// First-cell substring (lower-case) marking a serial column.
    pub serial_substring: String,
    /// Case-sensitive substring every roll number contains.
    pub roll_marker: String,
    /// Prefix every subject code starts with.
    pub subject_prefix: String,
    /// Upper-case grades that mean the subject was failed.
    pub failing_grades: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            roll_header_tokens: vec!["htno".to_owned()],
            subject_header_tokens: vec!["subcode".to_owned()],
            serial_tokens: vec!["sno".to_owned()],
            serial_substring: "serial".to_owned(),
            roll_marker: "HN".to_owned(),
            subject_prefix: "R".to_owned(),
            failing_grades: vec!["F".to_owned(), "ABSENT".to_owned(), "MP".to_owned()],
        }
    }
}

impl Markers {
    /// Parses markers from TOML, filling missing keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MarkersError::Toml`] if the TOML is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, MarkersError> {
        let markers: Self = toml::de::from_str(toml_str)?;
        Ok(markers.normalized())
    }

    /// Loads markers from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MarkersError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, MarkersError> {
        let contents = std::fs::read_to_string(path)?;
        let markers = Self::from_toml_str(&contents)?;
        log::info!("Loaded markers from {}", path.display());
        Ok(markers)
    }

    /// Renders the markers as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`MarkersError::Render`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, MarkersError> {
        Ok(toml::ser::to_string_pretty(self)?)
    }

    /// Lower-cases header tokens and upper-cases failing grades so that
    /// comparisons elsewhere can assume a canonical case.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let lower = |tokens: &mut Vec<String>| {
            for token in tokens.iter_mut() {
                *token = token.trim().to_lowercase();
            }
            tokens.retain(|t| !t.is_empty());
        };
        lower(&mut self.roll_header_tokens);
        lower(&mut self.subject_header_tokens);
        lower(&mut self.serial_tokens);
        self.serial_substring = self.serial_substring.trim().to_lowercase();

        for grade in &mut self.failing_grades {
            *grade = grade.trim().to_uppercase();
        }
        self
    }

    /// Whether a lower-cased header cell names the roll or subject code
    /// column.
    #[must_use]
    pub fn is_header_cell(&self, lowered: &str) -> bool {
        self.roll_header_tokens
            .iter()
            .chain(&self.subject_header_tokens)
            .any(|token| lowered.contains(token.as_str()))
    }

    /// Whether a lower-cased first header cell names a serial column.
    #[must_use]
    pub fn is_serial_cell(&self, lowered: &str) -> bool {
        self.serial_tokens.iter().any(|t| t == lowered)
            || (!self.serial_substring.is_empty() && lowered.contains(&self.serial_substring))
    }

    #[must_use]
    pub fn is_roll(&self, identifier: &str) -> bool {
        identifier.contains(&self.roll_marker)
    }

    #[must_use]
    pub fn is_failing_grade(&self, upper_grade: &str) -> bool {
        self.failing_grades.iter().any(|g| g == upper_grade)
    }
}
