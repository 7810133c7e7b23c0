//! Progress-callback trait for per-chunk digest events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each document and chunk.
//!
//! # Example
//!
//! ```rust
//! use pdf_digest::{DigestConfig, DigestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl DigestProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, document: &str, index: usize, total: usize, summary_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{document}: chunk {}/{} ({} bytes)", index + 1, total, summary_len);
//!     }
//! }
//!
//! let config = DigestConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes documents and chunks.
///
/// With `concurrency > 1` the chunk methods may be called concurrently and
/// out of chunk order; implementations must synchronise shared state.
pub trait DigestProgressCallback: Send + Sync {
    /// Called once, after input resolution, with the number of documents.
    fn on_run_start(&self, documents: usize) {
        let _ = documents;
    }

    /// Called when a document's text has been chunked.
    fn on_document_start(&self, document: &str, chunks: usize) {
        let _ = (document, chunks);
    }

    /// Called just before the backend request for a chunk is sent.
    fn on_chunk_start(&self, document: &str, index: usize, total: usize) {
        let _ = (document, index, total);
    }

    /// Called when the backend returned a summary for a chunk.
    fn on_chunk_complete(&self, document: &str, index: usize, total: usize, summary_len: usize) {
        let _ = (document, index, total, summary_len);
    }

    /// Called when a chunk ended with a failure marker.
    fn on_chunk_error(&self, document: &str, index: usize, total: usize, error: &str) {
        let _ = (document, index, total, error);
    }

    /// Called once per document after all its chunks were attempted.
    fn on_document_complete(&self, document: &str, ok_chunks: usize, total: usize) {
        let _ = (document, ok_chunks, total);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;
