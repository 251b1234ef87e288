//! Image encoding: `DynamicImage` → PNG bytes / base64 `ImageData`.
//!
//! Both recognizer backends consume PNG. Tesseract reads it from a file in
//! the worker's scratch directory; vision models take it as a base64 data
//! URI in the request body. PNG is lossless, and JPEG artefacts around glyph
//! edges measurably hurt recognition at receipt-sized fonts.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a page bitmap as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a page as a base64 PNG ready for a vision-model request.
///
/// `detail: "high"` keeps small print legible for OpenAI-style tiling.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
