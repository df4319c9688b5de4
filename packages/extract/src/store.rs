//! Semester-scoped student result storage.
//!
//! One store holds every semester: the semester is part of each
//! [`StudentKey`]. Upserts merge by subject code, so re-running the same
//! upload never duplicates subjects or students.

use std::collections::BTreeMap;

use async_trait::async_trait;
use marksheet_results_models::{MergeReport, StudentKey, StudentRecord};
use tokio::sync::Mutex;

/// Errors surfaced by a [`StudentStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or failed the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the data.
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Persistence capability required by the extraction pipeline.
///
/// `upsert_merge` must be atomic per student: either every new subject of
/// the record is stored or none is.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Looks up one student's record for one semester.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    async fn find_by_key(&self, key: &StudentKey) -> Result<Option<StudentRecord>, StoreError>;

    /// Creates the record if absent, otherwise appends the subjects whose
    /// codes are not stored yet. Stored subjects are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the merge fails; nothing is written then.
    async fn upsert_merge(&self, record: &StudentRecord) -> Result<MergeReport, StoreError>;

    /// Returns every semester's record for one roll number, ordered by
    /// semester.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    async fn find_by_identifier(&self, identifier: &str)
    -> Result<Vec<StudentRecord>, StoreError>;
}

/// An in-process [`StudentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<StudentKey, StudentRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored student records across all semesters.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn find_by_key(&self, key: &StudentKey) -> Result<Option<StudentRecord>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn upsert_merge(&self, record: &StudentRecord) -> Result<MergeReport, StoreError> {
        let mut records = self.records.lock().await;

        if let Some(existing) = records.get_mut(&record.key) {
            let appended = existing.merge_from(record);
            return Ok(MergeReport {
                created: false,
                appended,
            });
        }

        let mut created = StudentRecord::new(record.key.clone());
        let appended = created.merge_from(record);
        records.insert(record.key.clone(), created);
        Ok(MergeReport {
            created: true,
            appended,
        })
    }

    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.key.identifier == identifier)
            .cloned()
            .collect())
    }
}
