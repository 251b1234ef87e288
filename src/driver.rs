//! Pipeline driver: one full run from enumeration to catalog.
//!
//! ## Run outline
//!
//! ```text
//! list_keys(prefix) ─▶ filter(context) ─▶ batch ─▶ fan_out ─▶ merge ─▶ parse ─▶ sink
//!                                                                              │
//!                                                              mark_processed ◀┘
//! ```
//!
//! Only enumeration and sink failures abort a run. Per-document failures are
//! reported in [`PipelineOutput::documents`] and the catalog is built from
//! whatever succeeded.

use crate::config::{PipelineConfig, ReceiptContext};
use crate::error::PipelineError;
use crate::output::{DocumentRef, DocumentText, PipelineOutput, RunStats};
use crate::pipeline::fanout::{fan_out, merge_texts, select_batch};
use crate::pipeline::parse::parse_catalog;
use crate::pipeline::recognize::RecognizerFactory;
use crate::pipeline::render::Rasterizer;
use crate::pipeline::worker::PageWorker;
use crate::store::{CatalogSink, DocumentSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A configured extraction pipeline.
///
/// Every external system is an explicit handle supplied here; nothing is
/// resolved from ambient state at run time.
///
/// # Example
/// ```rust,no_run
/// use catalog_ocr::{
///     FsDocumentSource, JsonFileSink, PdfiumRasterizer, Pipeline, PipelineConfig,
///     ReceiptContext, TesseractFactory,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Pipeline::new(
///     FsDocumentSource::new("uploads/unprocessed", "uploads/processed"),
///     JsonFileSink::new("all-text.json"),
///     Arc::new(PdfiumRasterizer::new()),
///     TesseractFactory::new(),
///     PipelineConfig::default(),
/// );
/// let output = pipeline.run(ReceiptContext::Business).await?;
/// println!("{} items", output.catalog.len());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<S, K, F> {
    source: S,
    sink: K,
    rasterizer: Arc<dyn Rasterizer>,
    recognizers: F,
    config: PipelineConfig,
}

impl<S, K, F> Pipeline<S, K, F>
where
    S: DocumentSource,
    K: CatalogSink,
    F: RecognizerFactory,
{
    pub fn new(
        source: S,
        sink: K,
        rasterizer: Arc<dyn Rasterizer>,
        recognizers: F,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            sink,
            rasterizer,
            recognizers,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one batch for `context` and write the resulting catalog.
    ///
    /// # Errors
    /// Only for fatal conditions:
    /// - the source cannot be enumerated
    /// - the catalog cannot be written
    ///
    /// A run where every document fails still succeeds and writes an empty
    /// catalog; inspect `output.stats.failed`.
    pub async fn run(&self, context: ReceiptContext) -> Result<PipelineOutput, PipelineError> {
        let total_start = Instant::now();
        info!("Starting {} run", context);

        // ── Step 1: Enumerate and select ─────────────────────────────────────
        let (enumerated, batch) = self.select(context).await?;
        info!(
            "{} candidate(s), dispatching {} (batch size {})",
            enumerated,
            batch.len(),
            self.config.batch_size
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(batch.len());
        }

        // ── Step 2: Fan out and join ─────────────────────────────────────────
        let extract_start = Instant::now();
        let documents = fan_out(
            self.worker(),
            &batch,
            self.config.effective_concurrency(batch.len()),
            self.document_timeout(),
            self.config.progress_callback.clone(),
        )
        .await;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

        // ── Step 3: Merge and parse ──────────────────────────────────────────
        let merged = merge_texts(&documents);
        debug!("Merged text: {} bytes", merged.len());
        let catalog = parse_catalog(&merged);

        // ── Step 4: Write ────────────────────────────────────────────────────
        self.sink
            .write_catalog(&catalog)
            .await
            .map_err(|source| PipelineError::SinkWrite { source })?;

        // ── Step 5: Move consumed documents out of the unprocessed store ─────
        let mut mark_failures = Vec::new();
        if self.config.mark_processed {
            for doc in documents.iter().filter(|d| d.is_success()) {
                if let Err(e) = self.source.mark_processed(&doc.key).await {
                    warn!("Could not mark '{}' processed: {}", doc.key, e);
                    mark_failures.push((doc.key.clone(), e.to_string()));
                }
            }
        }

        // ── Step 6: Stats ────────────────────────────────────────────────────
        let stats = compute_stats(
            enumerated,
            &documents,
            catalog.len(),
            total_start.elapsed().as_millis() as u64,
            extract_duration_ms,
        );

        info!(
            "Run complete: {}/{} documents, {} items, {}ms total",
            stats.succeeded, stats.dispatched, stats.items, stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(stats.dispatched, stats.succeeded);
        }

        Ok(PipelineOutput {
            catalog,
            documents,
            mark_failures,
            stats,
        })
    }

    /// Synchronous wrapper around [`Pipeline::run`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn run_blocking(&self, context: ReceiptContext) -> Result<PipelineOutput, PipelineError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run(context))
    }

    /// Enumerate the source, keep the keys belonging to `context`, and take
    /// the batch. Returns the number of accepted candidates alongside it.
    pub(crate) async fn select(
        &self,
        context: ReceiptContext,
    ) -> Result<(usize, Vec<DocumentRef>), PipelineError> {
        let prefix = context.prefix();
        let keys: Vec<String> = self
            .source
            .list_keys(prefix)
            .await
            .map_err(|source| PipelineError::Enumeration {
                prefix: prefix.to_string(),
                source,
            })?
            .into_iter()
            .filter(|k| context.accepts(k))
            .collect();

        let enumerated = keys.len();
        Ok((enumerated, select_batch(keys, self.config.batch_size)))
    }

    pub(crate) fn worker(&self) -> PageWorker<'_, S, F> {
        PageWorker::new(
            &self.source,
            &self.rasterizer,
            &self.recognizers,
            self.config.dpi,
        )
    }

    pub(crate) fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.config.document_timeout_secs)
    }
}

fn compute_stats(
    enumerated: usize,
    documents: &[DocumentText],
    items: usize,
    total_duration_ms: u64,
    extract_duration_ms: u64,
) -> RunStats {
    let succeeded = documents.iter().filter(|d| d.is_success()).count();
    RunStats {
        enumerated,
        dispatched: documents.len(),
        succeeded,
        failed: documents.len() - succeeded,
        pages_total: documents.iter().map(|d| d.page_count).sum(),
        pages_failed: documents.iter().map(|d| d.page_failures.len()).sum(),
        items,
        total_duration_ms,
        extract_duration_ms,
    }
}
