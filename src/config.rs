//! Configuration types for a catalog extraction run.
//!
//! Every run knob lives in [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. The collaborators themselves (source, sink,
//! rasterizer, recognizer) are not configuration; they are injected into
//! [`crate::driver::Pipeline::new`] as explicit handles.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use catalog_ocr::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .batch_size(10)
///     .dpi(300)
///     .document_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 10);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Maximum number of documents dispatched in one run. Default: 5.
    ///
    /// When the source holds more candidates, only the first `batch_size`
    /// in enumeration order are processed; the rest wait for a later run.
    pub batch_size: usize,

    /// Rasterisation resolution for paginated documents. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Upper bound on workers in flight. Default: `None` (one per document in the batch).
    pub concurrency: Option<usize>,

    /// Per-document worker timeout in seconds. Default: 300.
    ///
    /// Rasterisation and OCR can both stall on pathological input. A worker
    /// that runs past this is recorded as failed and not retried.
    pub document_timeout_secs: u64,

    /// Move successfully extracted documents to the processed store. Default: true.
    pub mark_processed: bool,

    /// Optional per-document progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            dpi: 300,
            concurrency: None,
            document_timeout_secs: 300,
            mark_processed: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("batch_size", &self.batch_size)
            .field("dpi", &self.dpi)
            .field("concurrency", &self.concurrency)
            .field("document_timeout_secs", &self.document_timeout_secs)
            .field("mark_processed", &self.mark_processed)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Number of workers allowed in flight for a batch of `batch_len` documents.
    pub fn effective_concurrency(&self, batch_len: usize) -> usize {
        match self.concurrency {
            Some(n) => n.clamp(1, batch_len.max(1)),
            None => batch_len.max(1),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = Some(n.max(1));
        self
    }

    pub fn document_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_timeout_secs = secs;
        self
    }

    pub fn mark_processed(mut self, v: bool) -> Self {
        self.config.mark_processed = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if c.dpi < 72 || c.dpi > 600 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.document_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "Document timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

const BUSINESS_PREFIX: &str = "business/";

/// Which family of uploaded receipts a run consumes.
///
/// Business uploads are stored under `business/`; retail uploads sit at the
/// root of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReceiptContext {
    #[default]
    Business,
    Retail,
}

impl ReceiptContext {
    /// Listing prefix handed to the source store.
    pub fn prefix(&self) -> &'static str {
        match self {
            ReceiptContext::Business => BUSINESS_PREFIX,
            ReceiptContext::Retail => "",
        }
    }

    /// Whether a listed key belongs to this context.
    ///
    /// Retail lists the whole store, so business uploads have to be excluded
    /// explicitly.
    pub fn accepts(&self, key: &str) -> bool {
        match self {
            ReceiptContext::Business => key.starts_with(BUSINESS_PREFIX),
            ReceiptContext::Retail => !key.starts_with(BUSINESS_PREFIX),
        }
    }
}

impl fmt::Display for ReceiptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptContext::Business => f.write_str("business"),
            ReceiptContext::Retail => f.write_str("retail"),
        }
    }
}
