//! Terminal progress bar, one bar per (model, subject).

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;

use choicebench_runtime::ProgressObserver;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})";

/// Draws an indicatif bar for the subject being evaluated.
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
    hidden: bool,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            hidden: false,
        }
    }

    /// Track progress without drawing anything.
    pub fn hidden() -> Self {
        Self {
            bar: Mutex::new(None),
            hidden: true,
        }
    }

    fn bar_for(&self, len: u64) -> ProgressBar {
        if self.hidden {
            return ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::hidden());
        }

        let bar = ProgressBar::new(len);
        match ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => tracing::debug!(error = %e, "Falling back to the default bar style"),
        }
        bar
    }

    /// Position and length of the current bar.
    pub fn position(&self) -> Option<(u64, Option<u64>)> {
        self.bar
            .lock()
            .as_ref()
            .map(|bar| (bar.position(), bar.length()))
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for BarProgress {
    fn subject_started(&self, model: &str, subject: &str, items: usize) {
        let bar = self.bar_for(items as u64);
        bar.set_message(format!("{model} - {subject}"));
        if let Some(previous) = self.bar.lock().replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn item_finished(&self, _model: &str, _subject: &str) {
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.inc(1);
        }
    }

    fn subject_finished(&self, _model: &str, _subject: &str) {
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.finish_and_clear();
        }
    }
}
