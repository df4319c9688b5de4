//! Counters and discard log for one extraction run.

use marksheet_results_models::{BatchOutcome, Discard, DiscardReason};

/// Accumulates counts while a batch runs and produces the final
/// [`BatchOutcome`].
#[derive(Debug, Default)]
pub struct OutcomeReporter {
    processed: u64,
    skipped: u64,
    saved: u64,
    errors: Vec<Discard>,
}

impl OutcomeReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts an accepted subject record.
    pub const fn accepted(&mut self) {
        self.processed += 1;
    }

    /// Counts a discarded row or record and remembers why.
    pub fn skipped(&mut self, row: usize, reason: DiscardReason) {
        log::debug!("Skipping row {row}: {reason}");
        self.skipped += 1;
        self.errors.push(Discard {
            row: Some(row),
            reason,
        });
    }

    /// Counts a student record merged into the store.
    pub const fn saved(&mut self) {
        self.saved += 1;
    }

    /// Records a failed student upsert. Does not touch the skipped count:
    /// the student's subjects were already counted as processed.
    pub fn persist_failed(&mut self, identifier: &str, message: String) {
        log::error!("Failed to save results for {identifier}: {message}");
        self.errors.push(Discard {
            row: None,
            reason: DiscardReason::PersistenceFailed {
                identifier: identifier.to_owned(),
                message,
            },
        });
    }

    #[must_use]
    pub const fn skipped_count(&self) -> u64 {
        self.skipped
    }

    /// Finalizes the outcome. Success means at least one student was saved.
    #[must_use]
    pub fn finish(self) -> BatchOutcome {
        BatchOutcome {
            processed_count: self.processed,
            skipped_count: self.skipped,
            saved_count: self.saved,
            success: self.saved > 0,
            errors: self.errors,
        }
    }
}
