//! Phase-level progress reporting.
//!
//! Defines a [`ProgressSink`] trait that decouples the pipeline from any
//! rendering backend (terminal progress bars, a job-state store polled by an
//! upload endpoint, or silence). Only coarse [`Phase`] transitions are
//! reported, never per-row events.

use std::sync::Arc;

use marksheet_results_models::Phase;

/// Receives pipeline phase transitions.
///
/// Implementations must be `Send + Sync` to support `Arc`-based sharing
/// across tasks.
pub trait ProgressSink: Send + Sync {
    /// Called when the pipeline enters `phase`.
    fn phase(&self, phase: Phase);
}

/// A no-op implementation of [`ProgressSink`].
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn phase(&self, _phase: Phase) {}
}

/// Forwards every phase to each inner sink in order.
pub struct FanOut(pub Vec<Arc<dyn ProgressSink>>);

impl ProgressSink for FanOut {
    fn phase(&self, phase: Phase) {
        for sink in &self.0 {
            sink.phase(phase);
        }
    }
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressSink> {
    Arc::new(NullProgress)
}
