//! Progress spinner for mirror runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner that counts handled documents. Hidden when disabled, so callers
/// never branch on whether progress is shown.
pub(crate) struct DocumentProgress {
    spinner: ProgressBar,
}

impl DocumentProgress {
    pub(crate) fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} [{pos}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Searching documents...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    pub(crate) fn document_done(&self, filename: &str) {
        self.spinner.inc(1);
        self.spinner.set_message(filename.to_string());
    }

    /// Runs `f` with the spinner cleared so stdout lines are not interleaved.
    pub(crate) fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.spinner.suspend(f)
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}
