//! Progress-callback trait for per-document pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events while a batch is being extracted.
//!
//! # Example
//!
//! ```rust
//! use catalog_ocr::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _ordinal: usize, key: &str, text_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {key} ({text_len} bytes)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each document of the batch.
///
/// Workers run concurrently, so `on_document_*` may be called from several
/// tasks at once and in any order. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once, after the batch has been selected.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a worker picks up a document.
    ///
    /// # Arguments
    /// * `ordinal` — 0-based position of the document in the batch
    /// * `key`     — source key of the document
    fn on_document_start(&self, ordinal: usize, key: &str) {
        let _ = (ordinal, key);
    }

    /// Called when a document has been turned into text.
    fn on_document_complete(&self, ordinal: usize, key: &str, text_len: usize) {
        let _ = (ordinal, key, text_len);
    }

    /// Called when a document is excluded from the run.
    fn on_document_error(&self, ordinal: usize, key: &str, error: &str) {
        let _ = (ordinal, key, error);
    }

    /// Called once after every worker has joined.
    fn on_run_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_document_start(&self, _ordinal: usize, _key: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _ordinal: usize, _key: &str, _text_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _ordinal: usize, _key: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_document_start(0, "a.pdf");
        cb.on_document_complete(0, "a.pdf", 10);
        cb.on_document_error(1, "b.pdf", "boom");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_document_start(0, "a.pdf");
        cb.on_document_complete(0, "a.pdf", 120);
        cb.on_document_start(1, "b.png");
        cb.on_document_error(1, "b.png", "empty text");
        cb.on_run_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }
}
