//! Pipeline stages for receipt/catalog extraction.
//!
//! Each submodule implements one step; the driver in [`crate::driver`]
//! wires them together.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─ worker ────────────────────────────────────────────┐
//! fanout ──▶ │ fetch ──▶ render ──▶ recognize ──▶ postprocess      │ ──▶ merge ──▶ parse
//! (batch)    │ (source)  (pdfium)  (tesseract/VLM) (cleanup)       │    (ordinal) (catalog)
//!            └─────────────────────────────────────────────────────┘
//! ```
//!
//! 1. [`fanout`] — pick the batch, run one [`worker`] per document
//!    concurrently, join, and merge texts in batch order
//! 2. [`render`] — rasterise pages; runs in `spawn_blocking` because pdfium
//!    is not async-safe
//! 3. [`recognize`] — worker-exclusive OCR engines; [`llm`] is the
//!    vision-model backend, [`encode`] prepares bitmaps for both
//! 4. [`postprocess`] — normalise recognizer output into clean lines
//! 5. [`parse`] — the line-item state machine

pub mod encode;
pub mod fanout;
pub mod llm;
pub mod parse;
pub mod postprocess;
pub mod recognize;
pub mod render;
pub mod worker;
