//! Per-batch grouping of accepted subjects by student.

use std::collections::BTreeMap;

use marksheet_results_models::{DiscardReason, Semester, StudentKey, StudentRecord, SubjectRecord};

/// Groups subjects by roll number for one semester, first sighting first.
///
/// Within a batch the first occurrence of a subject code wins; later rows
/// repeating it for the same student are rejected as duplicates.
#[derive(Debug)]
pub struct Aggregator {
    semester: Semester,
    students: Vec<StudentRecord>,
    index: BTreeMap<String, usize>,
}

impl Aggregator {
    #[must_use]
    pub const fn new(semester: Semester) -> Self {
        Self {
            semester,
            students: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Records `subject` for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscardReason::DuplicateSubject`] if the student already has
    /// a subject with the same code in this batch.
    pub fn add(&mut self, identifier: &str, subject: SubjectRecord) -> Result<(), DiscardReason> {
        let position = match self.index.get(identifier) {
            Some(&position) => position,
            None => {
                let key = StudentKey::new(identifier, self.semester.clone());
                self.students.push(StudentRecord::new(key));
                let position = self.students.len() - 1;
                self.index.insert(identifier.to_owned(), position);
                position
            }
        };

        let subject_code = subject.subject_code.clone();
        if self.students[position].push_subject(subject) {
            Ok(())
        } else {
            Err(DiscardReason::DuplicateSubject {
                identifier: identifier.to_owned(),
                subject_code,
            })
        }
    }

    /// Number of distinct students seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.students.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Returns the student records in order of first sighting.
    #[must_use]
    pub fn into_records(self) -> Vec<StudentRecord> {
        self.students
    }
}
