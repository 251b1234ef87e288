//! Intermediate and final result types of a pipeline run.

use crate::catalog::Catalog;
use crate::error::{DocumentError, PageFailure};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Broad document family, inferred from the key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    /// Paginated vector document, rasterised page by page.
    Pdf,
    /// Single raster image, recognized in one pass.
    Image,
}

impl DocumentFormat {
    /// Infer the format from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp" => {
                Some(DocumentFormat::Image)
            }
            _ => None,
        }
    }
}

/// One candidate document in the source store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub key: String,
    pub format: Option<DocumentFormat>,
}

impl DocumentRef {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let format = DocumentFormat::from_extension(extension_of(&key));
        Self { key, format }
    }

    /// Suffix after the last `.` of the final path segment, or `""`.
    pub fn extension(&self) -> &str {
        extension_of(&self.key)
    }
}

fn extension_of(key: &str) -> &str {
    let name = key.rsplit('/').next().unwrap_or(key);
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[pos + 1..],
        _ => "",
    }
}

/// A single rasterised page, owned by the worker that produced it.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index within the document.
    pub page_index: usize,
    pub image: DynamicImage,
}

/// Text of one document, or the reason it has none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentText {
    /// 0-based position in the dispatched batch.
    pub ordinal: usize,
    pub key: String,
    /// Concatenated page texts in page order. Empty when `error` is set.
    pub text: String,
    pub page_count: usize,
    /// Pages whose recognition failed and were replaced by empty text.
    pub page_failures: Vec<PageFailure>,
    pub error: Option<DocumentError>,
    pub duration_ms: u64,
}

impl DocumentText {
    pub fn failed(ordinal: usize, key: impl Into<String>, error: DocumentError) -> Self {
        Self {
            ordinal,
            key: key.into(),
            text: String::new(),
            page_count: 0,
            page_failures: Vec::new(),
            error: Some(error),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Candidate keys accepted for the context.
    pub enumerated: usize,
    /// Documents actually dispatched (at most the batch size).
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pages_total: usize,
    pub pages_failed: usize,
    pub items: usize,
    pub total_duration_ms: u64,
    pub extract_duration_ms: u64,
}

/// Everything a successful run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub catalog: Catalog,
    /// Per-document outcomes in batch order.
    pub documents: Vec<DocumentText>,
    /// `(key, reason)` for successful documents that could not be marked processed.
    pub mark_failures: Vec<(String, String)>,
    pub stats: RunStats,
}

impl PipelineOutput {
    pub fn failed_documents(&self) -> impl Iterator<Item = &DocumentText> {
        self.documents.iter().filter(|d| !d.is_success())
    }
}
