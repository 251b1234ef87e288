//! End-to-end tests for catalog-ocr.
//!
//! These use real receipts under `./test_cases/receipts/`, the system
//! `tesseract` binary and a pdfium shared library. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test e2e -- --nocapture
//!
//! Fixture layout mirrors an upload bucket:
//!   test_cases/receipts/business/*.pdf
//!   test_cases/receipts/*.{pdf,png,jpg}

use catalog_ocr::{
    Catalog, FsDocumentSource, JsonFileSink, PdfiumRasterizer, Pipeline, PipelineConfig,
    Rasterizer, ReceiptContext, TesseractFactory,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/receipts")
}

/// Skip this test if E2E_ENABLED is not set *or* the fixture directory is missing.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p = fixtures_dir();
        if !p.exists() {
            println!("SKIP — fixtures not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Copy the fixture tree into a scratch "unprocessed" directory so runs can
/// move files without touching the checked-in fixtures.
fn stage(fixtures: &Path) -> TempDir {
    let tmp = TempDir::new().unwrap();
    copy_tree(fixtures, &tmp.path().join("unprocessed"));
    tmp
}

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let dest = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &dest);
        } else {
            std::fs::copy(entry.path(), dest).unwrap();
        }
    }
}

fn first_pdf(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|x| x == "pdf"))
}

// ── Collaborators ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tesseract_is_installed() {
    let _ = e2e_skip_unless_ready!();
    let banner = TesseractFactory::new().check_available().await.unwrap();
    println!("{banner}");
    assert!(banner.to_lowercase().contains("tesseract"));
}

#[test]
fn test_pdfium_counts_and_renders_pages() {
    let fixtures = e2e_skip_unless_ready!();
    let Some(pdf) = first_pdf(&fixtures.join("business")) else {
        println!("SKIP — no business PDF fixture");
        return;
    };

    let bytes = std::fs::read(&pdf).unwrap();
    let rasterizer = PdfiumRasterizer::new();
    let pages = rasterizer.page_count(&bytes).unwrap();
    assert!(pages >= 1);

    let img = rasterizer.render_page(&bytes, 0, 150).unwrap();
    assert!(img.width() > 100 && img.height() > 100);

    let out_of_range = rasterizer.render_page(&bytes, pages, 150);
    assert!(out_of_range.is_err());
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_business_run_writes_catalog_and_moves_documents() {
    let fixtures = e2e_skip_unless_ready!();
    let tmp = stage(&fixtures);
    let unprocessed = tmp.path().join("unprocessed");
    let processed = tmp.path().join("processed");
    let out_path = tmp.path().join("all-text.json");

    let pipeline = Pipeline::new(
        FsDocumentSource::new(&unprocessed, &processed),
        JsonFileSink::new(&out_path),
        Arc::new(PdfiumRasterizer::new()),
        TesseractFactory::new(),
        PipelineConfig::default(),
    );

    let output = pipeline.run(ReceiptContext::Business).await.unwrap();
    println!(
        "{}/{} documents, {} items",
        output.stats.succeeded, output.stats.dispatched, output.stats.items
    );

    let written: Catalog =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written, output.catalog);

    for doc in output.documents.iter().filter(|d| d.is_success()) {
        assert!(processed.join(&doc.key).exists(), "{} not moved", doc.key);
        assert!(!unprocessed.join(&doc.key).exists());
    }
    for doc in output.failed_documents() {
        assert!(unprocessed.join(&doc.key).exists(), "{} moved despite failing", doc.key);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retail_run_ignores_business_uploads() {
    let fixtures = e2e_skip_unless_ready!();
    let tmp = stage(&fixtures);

    let pipeline = Pipeline::new(
        FsDocumentSource::new(tmp.path().join("unprocessed"), tmp.path().join("processed")),
        JsonFileSink::new(tmp.path().join("retail.json")),
        Arc::new(PdfiumRasterizer::new()),
        TesseractFactory::new(),
        PipelineConfig::builder()
            .mark_processed(false)
            .build()
            .unwrap(),
    );

    let output = pipeline.run(ReceiptContext::Retail).await.unwrap();
    assert!(output
        .documents
        .iter()
        .all(|d| !d.key.starts_with("business/")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_output_json_uses_four_space_indent() {
    let fixtures = e2e_skip_unless_ready!();
    let tmp = stage(&fixtures);
    let out_path = tmp.path().join("all-text.json");

    let pipeline = Pipeline::new(
        FsDocumentSource::new(tmp.path().join("unprocessed"), tmp.path().join("processed")),
        JsonFileSink::new(&out_path),
        Arc::new(PdfiumRasterizer::new()),
        TesseractFactory::new(),
        PipelineConfig::default(),
    );
    pipeline.run(ReceiptContext::Business).await.unwrap();

    let json = std::fs::read_to_string(&out_path).unwrap();
    assert!(json.starts_with("{\n    \"items\""), "got: {json:.40}");
}
