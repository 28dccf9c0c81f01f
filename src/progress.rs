//! Progress-callback trait for per-candidate extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator walks the candidate list.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2json::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     recorded: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_candidate_recorded(&self, index: usize, total: usize, name: &str) {
//!         self.recorded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} done", index, total, name);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     recorded: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each candidate image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based within the run's candidate list.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after normalisation, before the first candidate.
    fn on_run_start(&self, total_candidates: usize) {
        let _ = total_candidates;
    }

    /// Called when a candidate already has a record and is not resubmitted.
    fn on_candidate_skipped(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called just before the inference request is sent.
    fn on_candidate_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when the parsed JSON has been written to the output folder.
    fn on_candidate_recorded(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when the raw response has been written to the errors folder.
    fn on_candidate_quarantined(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every candidate reached a terminal state.
    fn on_run_complete(&self, succeeded: usize, failed: usize, skipped: usize) {
        let _ = (succeeded, failed, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        recorded: AtomicUsize,
        quarantined: AtomicUsize,
        skipped: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_candidate_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_candidate_recorded(&self, _index: usize, _total: usize, _name: &str) {
            self.recorded.fetch_add(1, Ordering::SeqCst);
        }

        fn on_candidate_quarantined(&self, _index: usize, _total: usize, _name: &str, _e: &str) {
            self.quarantined.fetch_add(1, Ordering::SeqCst);
        }

        fn on_candidate_skipped(&self, _index: usize, _total: usize, _name: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_candidate_skipped(1, 3, "a_1.png");
        cb.on_candidate_start(2, 3, "a_2.png");
        cb.on_candidate_recorded(2, 3, "a_2.png");
        cb.on_candidate_quarantined(3, 3, "a_3.png", "boom");
        cb.on_run_complete(1, 1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_candidate_skipped(1, 3, "a_1.png");
        cb.on_candidate_start(2, 3, "a_2.png");
        cb.on_candidate_recorded(2, 3, "a_2.png");
        cb.on_candidate_start(3, 3, "a_3.png");
        cb.on_candidate_quarantined(3, 3, "a_3.png", "HTTP 500");

        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.recorded.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.quarantined.load(Ordering::SeqCst), 1);
    }
}
