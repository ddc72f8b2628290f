//! Progress-callback trait for per-document run events.
//!
//! Attach an [`Arc<dyn RunProgressCallback>`] with
//! [`crate::runner::Runner::with_progress`] to observe the consumer loop as
//! documents are exported or fail. The CLI uses it to drive a spinner.
//!
//! # Example
//!
//! ```rust
//! use notion2hugo::{RunProgressCallback, RunStats};
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl RunProgressCallback for Counter {
//!     fn on_document_exported(&self, id: &str, path: &Path) {
//!         let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{n} {id} → {}", path.display());
//!     }
//! }
//! ```

use crate::runner::RunStats;
use std::path::Path;
use std::sync::Arc;

/// Called by the runner as documents leave the pipeline.
///
/// All methods default to no-ops so implementations only override what they
/// care about. Calls come from the single consumer loop, one at a time.
pub trait RunProgressCallback: Send + Sync {
    /// Called once the provider has started streaming documents.
    fn on_run_start(&self) {}

    /// Called after a document has been written.
    ///
    /// # Arguments
    /// * `id`: document id
    /// * `path`: the written markdown file
    fn on_document_exported(&self, id: &str, path: &Path) {
        let _ = (id, path);
    }

    /// Called when a document was skipped because of a document-scoped error.
    fn on_document_failed(&self, id: &str, error: &str) {
        let _ = (id, error);
    }

    /// Called once the document stream is exhausted.
    fn on_run_complete(&self, stats: &RunStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Shared handle stored by the runner.
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
