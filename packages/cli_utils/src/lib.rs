#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the marksheet toolchain.
//!
//! Provides an `indicatif`-backed bar behind the [`ProgressSink`] trait,
//! plus [`init_logger`] which sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while progress bars redraw.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use marksheet_extract::progress::ProgressSink;
use marksheet_results_models::Phase;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressSink`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    label: String,
}

impl IndicatifProgress {
    /// Creates a bar with one step per pipeline [`Phase`]. The bar finishes
    /// when [`Phase::Done`] is reported.
    #[must_use]
    pub fn phases_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressSink> {
        let bar = multi.add(ProgressBar::new(Phase::Done.step()));
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message(message.to_string());

        Arc::new(Self {
            bar,
            label: message.to_string(),
        })
    }
}

impl ProgressSink for IndicatifProgress {
    fn phase(&self, phase: Phase) {
        self.bar.set_position(phase.step());
        if phase == Phase::Done {
            self.bar.finish_with_message(format!("{} done", self.label));
        } else {
            self.bar.set_message(format!("{} ({phase})", self.label));
        }
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Already set in tests

    log::set_max_level(level);

    multi
}
