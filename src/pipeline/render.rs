//! Page rasterisation: turn document bytes into page bitmaps.
//!
//! [`Rasterizer`] is the seam between the page worker and the PDF engine.
//! Its methods are synchronous and CPU-bound; the worker always calls them
//! through `tokio::task::spawn_blocking` so rendering never stalls the async
//! executor. [`PdfiumRasterizer`] is the production implementation.
//!
//! ## Why scale by DPI here?
//!
//! Tesseract is tuned for ~300 DPI input. A PDF page is measured in points
//! (1/72 inch), so the render scale is simply `dpi / 72`. The pixel cap is a
//! safety net for oversized pages, not the primary sizing control.

use crate::error::RasterError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Converts pages of a paginated document into bitmaps.
pub trait Rasterizer: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, document: &[u8]) -> Result<usize, RasterError>;

    /// Render the 0-based `page_index` at `dpi`.
    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, RasterError>;
}

/// Decode a raster image document (PNG, JPEG, …) into a bitmap.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, RasterError> {
    image::load_from_memory(bytes).map_err(|e| RasterError::Decode(e.to_string()))
}

/// Rasterizer backed by the pdfium library.
///
/// The library is located via `library_dir` when set, otherwise through the
/// system library search path. Each call binds and loads the document
/// afresh, so one instance can be shared by every worker.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
    max_edge_px: i32,
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self {
            library_dir: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
            max_edge_px: 8000,
        }
    }
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load libpdfium from this directory instead of the system path.
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    /// Cap on either rendered dimension. Default: 8000 px.
    pub fn with_max_edge_px(mut self, px: u32) -> Self {
        self.max_edge_px = px.clamp(100, i32::MAX as u32) as i32;
        self
    }

    fn bind(&self) -> Result<Pdfium, RasterError> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| RasterError::Binding(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn page_count(&self, document: &[u8]) -> Result<usize, RasterError> {
        let pdfium = self.bind()?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| RasterError::Open(format!("{:?}", e)))?;
        Ok(doc.pages().len() as usize)
    }

    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, RasterError> {
        let pdfium = self.bind()?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| RasterError::Open(format!("{:?}", e)))?;

        let page = doc
            .pages()
            .get(page_index as u16)
            .map_err(|e| RasterError::Render {
                page: page_index + 1,
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(self.max_edge_px)
            .set_maximum_height(self.max_edge_px);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RasterError::Render {
                page: page_index + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} at {} DPI → {}x{} px",
            page_index + 1,
            dpi,
            image.width(),
            image.height()
        );

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::encode_png;
    use image::{GrayImage, Luma};

    #[test]
    fn decode_png_roundtrip_dimensions() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 3, Luma([9])));
        let png = encode_png(&img).unwrap();
        let decoded = decode_image(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 3));
    }

    #[test]
    fn decode_garbage_is_an_error() {
        let err = decode_image(b"%PDF-1.7 not an image").unwrap_err();
        assert!(matches!(err, RasterError::Decode(_)));
    }

    #[test]
    fn builder_overrides() {
        let r = PdfiumRasterizer::new()
            .with_library_dir("/opt/pdfium/lib")
            .with_max_edge_px(10);
        assert_eq!(r.max_edge_px, 100);
        assert_eq!(r.library_dir.as_deref(), Some(std::path::Path::new("/opt/pdfium/lib")));
    }
}
