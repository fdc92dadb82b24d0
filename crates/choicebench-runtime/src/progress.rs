//! Progress reporting for a running evaluation.
//!
//! The evaluator calls a [`ProgressObserver`] as subjects start and finish
//! and once for every item that resolves, whatever its outcome. Methods are
//! called from item tasks, so they should be cheap and never block.

/// Receives progress events. Every method defaults to doing nothing.
pub trait ProgressObserver: Send + Sync {
    /// A subject with `items` items is about to be evaluated.
    fn subject_started(&self, _model: &str, _subject: &str, _items: usize) {}

    /// One item resolved, answered or failed.
    fn item_finished(&self, _model: &str, _subject: &str) {}

    /// Every item of the subject resolved.
    fn subject_finished(&self, _model: &str, _subject: &str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
