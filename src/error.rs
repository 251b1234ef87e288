//! Error types for the catalog-ocr library.
//!
//! Errors fall into three groups:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot complete (the source could
//!   not be enumerated, the catalog could not be written, bad configuration).
//!   Returned as `Err(PipelineError)` from [`crate::driver::Pipeline::run`].
//!
//! * [`DocumentError`] — **Non-fatal**: one document of the batch could not
//!   be turned into text. Stored inside [`crate::output::DocumentText`]; the
//!   document is left out of the merged text and the rest of the batch
//!   carries on. [`PageFailure`] records the even finer case of a single page
//!   whose recognized text was replaced with an empty string.
//!
//! * [`StoreError`], [`RasterError`], [`RecognitionError`] — what the
//!   collaborators (storage, rasterizer, OCR engine) report. The pipeline
//!   wraps them into one of the two kinds above.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a pipeline run.
///
/// Document-level failures use [`DocumentError`] and are stored in
/// [`crate::output::DocumentText`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Listing candidate documents in the source store failed.
    #[error("Could not enumerate documents under prefix '{prefix}': {source}")]
    Enumeration {
        prefix: String,
        #[source]
        source: StoreError,
    },

    /// The parsed catalog could not be written to the sink.
    #[error("Failed to write catalog: {source}")]
    SinkWrite {
        #[source]
        source: StoreError,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document of the batch.
///
/// The document contributes nothing to the merged text. It is attempted
/// exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DocumentError {
    /// Document bytes could not be fetched from the source store.
    #[error("'{key}': fetch failed: {detail}")]
    Fetch { key: String, detail: String },

    /// The key suffix names neither a paginated nor a raster format.
    #[error("'{key}': unsupported document format '{extension}'")]
    UnsupportedFormat { key: String, extension: String },

    /// The document (or one of its pages) could not be rasterised or decoded.
    #[error("'{key}': rasterisation failed: {detail}")]
    Rasterization { key: String, detail: String },

    /// No recognizer could be opened for this document.
    #[error("'{key}': recognizer unavailable: {detail}")]
    Recognition { key: String, detail: String },

    /// Every page came back from the recognizer blank.
    #[error("'{key}': recognizer produced no text ({pages} pages)")]
    EmptyText { key: String, pages: usize },

    /// The worker exceeded the per-document timeout.
    #[error("'{key}': timed out after {secs}s")]
    Timeout { key: String, secs: u64 },

    /// The worker vanished without reporting (should not happen).
    #[error("'{key}': internal error: {detail}")]
    Internal { key: String, detail: String },
}

impl DocumentError {
    /// The key of the document that failed.
    pub fn key(&self) -> &str {
        match self {
            DocumentError::Fetch { key, .. }
            | DocumentError::UnsupportedFormat { key, .. }
            | DocumentError::Rasterization { key, .. }
            | DocumentError::Recognition { key, .. }
            | DocumentError::EmptyText { key, .. }
            | DocumentError::Timeout { key, .. }
            | DocumentError::Internal { key, .. } => key,
        }
    }
}

/// One page whose recognition failed; an empty string was used in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    /// 1-indexed page number.
    pub page: usize,
    pub detail: String,
}

/// Errors reported by a [`crate::store::DocumentSource`] or
/// [`crate::store::CatalogSink`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object '{key}' not found")]
    NotFound { key: String },

    /// Key would escape the store root or is otherwise malformed.
    #[error("invalid object key '{key}'")]
    InvalidKey { key: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Anything a custom backend wants to report.
    #[error("{0}")]
    Backend(String),
}

/// Errors reported by a [`crate::pipeline::render::Rasterizer`].
#[derive(Debug, Error)]
pub enum RasterError {
    /// The pdfium library could not be loaded.
    #[error("failed to bind to pdfium: {0}")]
    Binding(String),

    #[error("could not open document: {0}")]
    Open(String),

    #[error("page {page} could not be rendered: {detail}")]
    Render { page: usize, detail: String },

    #[error("could not decode image: {0}")]
    Decode(String),
}

/// Errors reported by a [`crate::pipeline::recognize::Recognizer`].
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The OCR engine is not installed or could not be started.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but rejected this bitmap.
    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("could not encode page image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
