//! Streaming extraction: yield each document's text as its worker finishes.
//!
//! [`Pipeline::run`] waits for the whole batch, merges, parses and writes.
//! [`Pipeline::extract_stream`] stops before all of that and hands back the
//! per-document results in completion order, for callers that want to show
//! progress or inspect the raw text. Nothing is parsed, written or marked
//! processed; sort by `ordinal` to recover batch order.

use crate::config::ReceiptContext;
use crate::driver::Pipeline;
use crate::error::PipelineError;
use crate::output::DocumentText;
use crate::pipeline::fanout::dispatch;
use crate::pipeline::recognize::RecognizerFactory;
use crate::store::{CatalogSink, DocumentSource};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document results, borrowing the pipeline.
pub type DocumentStream<'a> = Pin<Box<dyn Stream<Item = DocumentText> + Send + 'a>>;

impl<S, K, F> Pipeline<S, K, F>
where
    S: DocumentSource,
    K: CatalogSink,
    F: RecognizerFactory,
{
    /// Enumerate and dispatch one batch, streaming results as they complete.
    ///
    /// # Example
    /// ```rust,no_run
    /// use catalog_ocr::{
    ///     FsDocumentSource, JsonFileSink, PdfiumRasterizer, Pipeline, PipelineConfig,
    ///     ReceiptContext, TesseractFactory,
    /// };
    /// use futures::StreamExt;
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
    /// let mut docs = pipeline.extract_stream(ReceiptContext::Retail).await?;
    /// while let Some(doc) = docs.next().await {
    ///     match doc.error {
    ///         None => println!("{}: {} bytes", doc.key, doc.text.len()),
    ///         Some(e) => eprintln!("{e}"),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Only when the source cannot be enumerated.
    pub async fn extract_stream(
        &self,
        context: ReceiptContext,
    ) -> Result<DocumentStream<'_>, PipelineError> {
        let (enumerated, batch) = self.select(context).await?;
        info!(
            "Streaming {} of {} {} candidate(s)",
            batch.len(),
            enumerated,
            context
        );

        let concurrency = self.config().effective_concurrency(batch.len());
        Ok(Box::pin(dispatch(
            self.worker(),
            batch,
            concurrency,
            self.document_timeout(),
            self.config().progress_callback.clone(),
        )))
    }
}
