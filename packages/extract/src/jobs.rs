//! Explicit job-state store for background extractions.
//!
//! Upload glue creates a job, hands a [`JobProgress`] to the pipeline, and
//! lets clients poll [`JobStore::get`]. Once a client has observed a
//! terminal state, [`JobStore::take_terminal`] removes it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use marksheet_results_models::{BatchOutcome, Phase};
use serde::Serialize;
use uuid::Uuid;

use crate::ExtractError;
use crate::progress::ProgressSink;

/// Identifier of one extraction job.
pub type JobId = Uuid;

/// Last known state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub phase: Phase,
    /// Set when the job finished with an outcome.
    pub outcome: Option<BatchOutcome>,
    /// Set when the job failed as a whole.
    pub error: Option<String>,
}

impl JobState {
    const fn started() -> Self {
        Self {
            phase: Phase::Reading,
            outcome: None,
            error: None,
        }
    }

    /// A job is terminal once it has an outcome or an error.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.outcome.is_some() || self.error.is_some()
    }
}

/// Shared map of job states, keyed by [`JobId`].
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<BTreeMap<JobId, JobState>>,
}

impl JobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<JobId, JobState>> {
        // State is replaced wholesale under the lock, so a poisoned map is
        // still consistent.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new job in the [`Phase::Reading`] phase.
    #[must_use]
    pub fn create(&self) -> JobId {
        let id = Uuid::new_v4();
        self.lock().insert(id, JobState::started());
        log::debug!("Created job {id}");
        id
    }

    /// Moves a job to `phase`. Unknown or terminal jobs are ignored.
    pub fn set_phase(&self, id: JobId, phase: Phase) {
        if let Some(state) = self.lock().get_mut(&id)
            && !state.is_terminal()
        {
            state.phase = phase;
        }
    }

    /// Marks a job finished with `outcome`.
    pub fn complete(&self, id: JobId, outcome: BatchOutcome) {
        if let Some(state) = self.lock().get_mut(&id) {
            state.phase = Phase::Done;
            state.outcome = Some(outcome);
        }
    }

    /// Marks a job failed with `message`.
    pub fn fail(&self, id: JobId, message: String) {
        if let Some(state) = self.lock().get_mut(&id) {
            state.phase = Phase::Done;
            state.error = Some(message);
        }
    }

    /// Records the result of a finished extraction.
    pub fn finish(&self, id: JobId, result: &Result<BatchOutcome, ExtractError>) {
        match result {
            Ok(outcome) => self.complete(id, outcome.clone()),
            Err(e) => self.fail(id, e.to_string()),
        }
    }

    /// Returns a snapshot of a job's state.
    #[must_use]
    pub fn get(&self, id: JobId) -> Option<JobState> {
        self.lock().get(&id).cloned()
    }

    /// Returns and removes a job's state if it is terminal. Running jobs
    /// are left in place and `None` is returned.
    pub fn take_terminal(&self, id: JobId) -> Option<JobState> {
        let mut jobs = self.lock();
        if jobs.get(&id).is_some_and(JobState::is_terminal) {
            log::debug!("Reaped job {id}");
            return jobs.remove(&id);
        }
        None
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// A [`ProgressSink`] writing phase transitions into a [`JobStore`].
pub struct JobProgress {
    jobs: Arc<JobStore>,
    id: JobId,
}

impl JobProgress {
    #[must_use]
    pub const fn new(jobs: Arc<JobStore>, id: JobId) -> Self {
        Self { jobs, id }
    }
}

impl ProgressSink for JobProgress {
    fn phase(&self, phase: Phase) {
        self.jobs.set_phase(self.id, phase);
    }
}
