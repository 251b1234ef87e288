//! Page worker: one document in, its text (or the reason it has none) out.
//!
//! For a PDF the worker counts pages, then rasterises and recognizes them
//! strictly in order `0..P`, so page texts are concatenated by page index by
//! construction. A raster image is decoded and recognized in one pass.
//!
//! ## Failure policy
//!
//! | Failure | Effect |
//! |---------|--------|
//! | unknown suffix | `UnsupportedFormat`, nothing is fetched |
//! | fetch | `Fetch` |
//! | page count / render / decode | `Rasterization` for the whole document |
//! | recognizer cannot be opened | `Recognition` |
//! | one page's recognition fails | recorded as [`PageFailure`], empty text substituted, document continues |
//! | all pages blank | `EmptyText` |

use crate::error::{DocumentError, PageFailure, RasterError};
use crate::output::{DocumentFormat, DocumentRef, DocumentText, PageImage};
use crate::pipeline::postprocess::clean_ocr_text;
use crate::pipeline::recognize::{Recognizer, RecognizerFactory};
use crate::pipeline::render::{decode_image, Rasterizer};
use crate::store::DocumentSource;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Borrowed view of the services a worker needs.
///
/// Cheap to copy; every in-flight document gets its own copy while the
/// services themselves stay owned by the pipeline.
pub struct PageWorker<'a, S, F> {
    source: &'a S,
    rasterizer: &'a Arc<dyn Rasterizer>,
    recognizers: &'a F,
    dpi: u32,
}

impl<S, F> Clone for PageWorker<'_, S, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, F> Copy for PageWorker<'_, S, F> {}

struct Extracted {
    text: String,
    page_count: usize,
    page_failures: Vec<PageFailure>,
}

impl<'a, S, F> PageWorker<'a, S, F>
where
    S: DocumentSource,
    F: RecognizerFactory,
{
    pub fn new(
        source: &'a S,
        rasterizer: &'a Arc<dyn Rasterizer>,
        recognizers: &'a F,
        dpi: u32,
    ) -> Self {
        Self {
            source,
            rasterizer,
            recognizers,
            dpi,
        }
    }

    /// Turn one document into text. Never fails: errors are recorded in the result.
    pub async fn process(&self, ordinal: usize, doc: &DocumentRef) -> DocumentText {
        let start = Instant::now();

        let mut result = match self.extract(doc).await {
            Ok(done) => DocumentText {
                ordinal,
                key: doc.key.clone(),
                text: done.text,
                page_count: done.page_count,
                page_failures: done.page_failures,
                error: None,
                duration_ms: 0,
            },
            Err(e) => DocumentText::failed(ordinal, &doc.key, e),
        };

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn extract(&self, doc: &DocumentRef) -> Result<Extracted, DocumentError> {
        let key = doc.key.as_str();
        let format = doc.format.ok_or_else(|| DocumentError::UnsupportedFormat {
            key: key.to_string(),
            extension: doc.extension().to_string(),
        })?;

        let bytes: Arc<[u8]> = self
            .source
            .fetch_bytes(key)
            .await
            .map_err(|e| DocumentError::Fetch {
                key: key.to_string(),
                detail: e.to_string(),
            })?
            .into();

        // Worker-exclusive engine, released when this function returns
        let mut recognizer =
            self.recognizers
                .acquire()
                .map_err(|e| DocumentError::Recognition {
                    key: key.to_string(),
                    detail: e.to_string(),
                })?;

        let page_count = match format {
            DocumentFormat::Pdf => {
                let rasterizer = Arc::clone(self.rasterizer);
                let doc_bytes = Arc::clone(&bytes);
                blocking(key, move || rasterizer.page_count(&doc_bytes)).await?
            }
            DocumentFormat::Image => 1,
        };
        debug!("'{}': {} page(s)", key, page_count);

        let mut texts = Vec::with_capacity(page_count);
        let mut page_failures = Vec::new();

        for page_index in 0..page_count {
            let doc_bytes = Arc::clone(&bytes);
            let image = match format {
                DocumentFormat::Pdf => {
                    let rasterizer = Arc::clone(self.rasterizer);
                    let dpi = self.dpi;
                    blocking(key, move || {
                        rasterizer.render_page(&doc_bytes, page_index, dpi)
                    })
                    .await?
                }
                DocumentFormat::Image => blocking(key, move || decode_image(&doc_bytes)).await?,
            };

            let page = PageImage { page_index, image };
            match recognizer.recognize(&page).await {
                Ok(raw) => {
                    let text = clean_ocr_text(&raw);
                    debug!("'{}' page {}: {} bytes", key, page_index + 1, text.len());
                    texts.push(text);
                }
                Err(e) => {
                    warn!(
                        "'{}' page {}: recognition failed, using empty text: {}",
                        key,
                        page_index + 1,
                        e
                    );
                    page_failures.push(PageFailure {
                        page: page_index + 1,
                        detail: e.to_string(),
                    });
                    texts.push(String::new());
                }
            }
        }

        let text = texts.concat();
        if text.trim().is_empty() {
            return Err(DocumentError::EmptyText {
                key: key.to_string(),
                pages: page_count,
            });
        }

        Ok(Extracted {
            text,
            page_count,
            page_failures,
        })
    }
}

/// Run a CPU-bound rasteriser call on the blocking pool.
async fn blocking<T, Op>(key: &str, op: Op) -> Result<T, DocumentError>
where
    T: Send + 'static,
    Op: FnOnce() -> Result<T, RasterError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| DocumentError::Internal {
            key: key.to_string(),
            detail: format!("render task panicked: {}", e),
        })?
        .map_err(|e| DocumentError::Rasterization {
            key: key.to_string(),
            detail: e.to_string(),
        })
}
