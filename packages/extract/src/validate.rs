//! Structural validation of extracted subject records.

use marksheet_results_models::{InvalidField, SubjectRecord};

use crate::markers::Markers;

/// Checks a subject record's fields, returning the first invalid one.
///
/// Internal marks need no check here: extraction always produces an
/// integer. Status is an enum and so always one of its two values.
///
/// # Errors
///
/// Returns the [`InvalidField`] that failed: an empty or unprefixed subject
/// code, an empty subject name, an empty grade, or non-finite credits.
pub fn validate_subject(subject: &SubjectRecord, markers: &Markers) -> Result<(), InvalidField> {
    if subject.subject_code.is_empty() || !subject.subject_code.starts_with(&markers.subject_prefix)
    {
        return Err(InvalidField::SubjectCode);
    }
    if subject.subject_name.is_empty() {
        return Err(InvalidField::SubjectName);
    }
    if subject.grade.is_empty() {
        return Err(InvalidField::Grade);
    }
    if !subject.credits.is_finite() {
        return Err(InvalidField::Credits);
    }
    Ok(())
}
