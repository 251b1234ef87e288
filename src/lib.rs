//! # catalog-ocr
//!
//! Extract priced line items from scanned receipts and product catalogs.
//!
//! ## Why this crate?
//!
//! Uploaded receipts arrive as PDFs and phone photos. Text extraction alone
//! is not enough: the useful output is the list of products with their pack
//! size, unit of measure and price. This crate rasterises each document,
//! runs OCR on every page, and feeds the text through a small line-oriented
//! state machine that recognizes the invoice layout:
//!
//! ```text
//! CHEDDAR BLOCK | 0042 |
//! Size: 12 X 200GR
//! UOM: CS
//! $48.90
//! ```
//!
//! ## Pipeline Overview
//!
//! ```text
//! store
//!  │
//!  ├─ 1. Select   list keys for the context, take the first batch
//!  ├─ 2. Fan out  one worker per document, concurrently
//!  │    ├─ render     rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  │    └─ recognize  tesseract or a vision LLM, page by page
//!  ├─ 3. Merge    document texts in batch order, failures excluded
//!  ├─ 4. Parse    line items → catalog
//!  └─ 5. Output   JSON catalog, consumed documents moved to "processed"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_ocr::{
//!     FsDocumentSource, JsonFileSink, PdfiumRasterizer, Pipeline, PipelineConfig,
//!     ReceiptContext, TesseractFactory,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(
//!         FsDocumentSource::new("uploads/unprocessed", "uploads/processed"),
//!         JsonFileSink::new("all-text.json"),
//!         Arc::new(PdfiumRasterizer::new()),
//!         TesseractFactory::new().language("eng"),
//!         PipelineConfig::default(),
//!     );
//!     let output = pipeline.run(ReceiptContext::Business).await?;
//!     eprintln!("{} items from {}/{} documents",
//!         output.catalog.len(),
//!         output.stats.succeeded,
//!         output.stats.dispatched);
//!     Ok(())
//! }
//! ```
//!
//! Parsing alone needs no OCR at all:
//!
//! ```rust
//! let catalog = catalog_ocr::parse_catalog("Widget | 1 |\nUOM: EA\n$1.99\n");
//! assert_eq!(catalog.items[0].uom, "EA");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `catalog-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! catalog-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{Catalog, LineItem};
pub use config::{PipelineConfig, PipelineConfigBuilder, ReceiptContext};
pub use driver::Pipeline;
pub use error::{
    DocumentError, PageFailure, PipelineError, RasterError, RecognitionError, StoreError,
};
pub use output::{DocumentFormat, DocumentRef, DocumentText, PageImage, PipelineOutput, RunStats};
pub use pipeline::llm::{VisionFactory, VisionRecognizer};
pub use pipeline::parse::{parse_catalog, LineItemParser};
pub use pipeline::recognize::{Recognizer, RecognizerFactory, TesseractFactory, TesseractRecognizer};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use store::{CatalogSink, DocumentSource, FsDocumentSource, JsonFileSink};
pub use stream::DocumentStream;
