//! Text recognition: page bitmap → text.
//!
//! The OCR engine is treated as a black box with a text-or-error contract.
//! Engines are not assumed to be reentrant, so the pipeline never shares one
//! between workers: each worker calls [`RecognizerFactory::acquire`] once,
//! keeps the returned [`Recognizer`] for all pages of its document, and drops
//! it when done.
//!
//! [`TesseractRecognizer`] drives the system `tesseract` binary. The vision
//! model backend lives in [`crate::pipeline::llm`].

use crate::error::RecognitionError;
use crate::output::PageImage;
use crate::pipeline::encode::encode_png;
use std::future::Future;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

/// A worker-exclusive OCR engine handle.
pub trait Recognizer: Send {
    /// Recognize the text on one page.
    fn recognize(
        &mut self,
        page: &PageImage,
    ) -> impl Future<Output = Result<String, RecognitionError>> + Send;
}

/// Opens recognizers, one per worker.
pub trait RecognizerFactory: Send + Sync {
    type Recognizer: Recognizer;

    /// Open a fresh recognizer. Released when the returned value is dropped.
    fn acquire(&self) -> Result<Self::Recognizer, RecognitionError>;
}

// ── Tesseract ────────────────────────────────────────────────────────────────

/// Opens [`TesseractRecognizer`]s.
#[derive(Debug, Clone)]
pub struct TesseractFactory {
    binary: PathBuf,
    language: String,
    dpi: u32,
}

impl Default for TesseractFactory {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            dpi: 300,
        }
    }
}

impl TesseractFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path to the `tesseract` executable. Default: `tesseract` on `PATH`.
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = path.into();
        self
    }

    /// Tesseract language code(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.language = lang.into();
        self
    }

    /// Resolution hint passed as `--dpi`; should match the render DPI.
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Probe `tesseract --version`; returns the first line of its output.
    pub async fn check_available(&self) -> Result<String, RecognitionError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                RecognitionError::Unavailable(format!("{}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            return Err(RecognitionError::Unavailable(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        // Older releases print the banner on stderr
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }
}

impl RecognizerFactory for TesseractFactory {
    type Recognizer = TesseractRecognizer;

    fn acquire(&self) -> Result<TesseractRecognizer, RecognitionError> {
        let scratch = tempfile::Builder::new()
            .prefix("catalog-ocr-")
            .tempdir()?;
        Ok(TesseractRecognizer {
            binary: self.binary.clone(),
            language: self.language.clone(),
            dpi: self.dpi,
            scratch,
        })
    }
}

/// One tesseract session with its own scratch directory.
///
/// Page PNGs are written into the scratch directory and fed to the binary;
/// the directory is removed when the recognizer is dropped.
#[derive(Debug)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
    dpi: u32,
    scratch: TempDir,
}

impl Recognizer for TesseractRecognizer {
    async fn recognize(&mut self, page: &PageImage) -> Result<String, RecognitionError> {
        let png = encode_png(&page.image)?;
        let path = self
            .scratch
            .path()
            .join(format!("page-{:04}.png", page.page_index + 1));
        tokio::fs::write(&path, &png).await?;

        let output = Command::new(&self.binary)
            .arg(&path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--dpi")
            .arg(self.dpi.to_string())
            .output()
            .await
            .map_err(|e| {
                RecognitionError::Unavailable(format!("{}: {}", self.binary.display(), e))
            })?;

        // Pages are independent; don't let the scratch dir grow with the document
        tokio::fs::remove_file(&path).await.ok();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Engine(format!(
                "tesseract exited with {} on page {}: {}",
                output.status,
                page.page_index + 1,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "tesseract page {}: {} bytes of text",
            page.page_index + 1,
            text.len()
        );
        Ok(text)
    }
}
