//! Progress-callback trait for extraction-session events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as a session consumes the recognition stream.
//!
//! # Example
//!
//! ```rust
//! use edgequake_flyer2md::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     snapshots: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_snapshot(&self, step: usize, fields: usize) {
//!         self.snapshots.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("snapshot {step}: {fields} fields");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { snapshots: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by an extraction session as it observes snapshots.
///
/// The same callback may be shared by concurrent sessions, hence
/// `Send + Sync`. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once when a session starts consuming its stream.
    fn on_session_start(&self) {}

    /// Called after each snapshot is parsed.
    ///
    /// # Arguments
    /// * `step`   — 1-indexed snapshot number
    /// * `fields` — number of fields in the freshly parsed record
    fn on_snapshot(&self, step: usize, fields: usize) {
        let _ = (step, fields);
    }

    /// Called once the final document has been written.
    fn on_document_written(&self, path: &Path) {
        let _ = path;
    }

    /// Called when a session fails (upstream error, incomplete stream, I/O).
    fn on_session_error(&self, error: &str) {
        let _ = error;
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
        snapshots: AtomicUsize,
        written: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_session_start(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_snapshot(&self, _step: usize, _fields: usize) {
            self.snapshots.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_written(&self, _path: &Path) {
            self.written.fetch_add(1, Ordering::SeqCst);
        }

        fn on_session_error(&self, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_session_start();
        cb.on_snapshot(1, 2);
        cb.on_document_written(Path::new("output/x.md"));
        cb.on_session_error("boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_session_start();
        tracker.on_snapshot(1, 1);
        tracker.on_snapshot(2, 2);
        tracker.on_document_written(Path::new("output/x.md"));

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.snapshots.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.written.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_session_start();
        cb.on_snapshot(1, 0);
    }
}
