//! CLI binary for catalog-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `PipelineConfig` plus concrete source, sink and recognizer handles, then
//! prints a run summary.

use anyhow::{Context, Result};
use catalog_ocr::{
    parse_catalog, FsDocumentSource, JsonFileSink, PdfiumRasterizer, Pipeline, PipelineConfig,
    PipelineOutput, PipelineProgressCallback, ProgressCallback, ReceiptContext, RecognizerFactory,
    TesseractFactory, VisionFactory,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per finished document. Documents
/// complete out of order, so start times are keyed by ordinal.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }

    fn elapsed_secs(&self, ordinal: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&ordinal))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_documents} document(s)…"))
        ));
    }

    fn on_document_start(&self, ordinal: usize, key: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(ordinal, Instant::now());
        }
        self.bar.set_message(key.to_string());
    }

    fn on_document_complete(&self, ordinal: usize, key: &str, text_len: usize) {
        let secs = self.elapsed_secs(ordinal);
        self.bar.println(format!(
            "  {} {:<48}  {}  {}",
            green("✓"),
            key,
            dim(&format!("{text_len:>6} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, ordinal: usize, key: &str, error: &str) {
        let secs = self.elapsed_secs(ordinal);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('…');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<48}  {}  {}",
            red("✗"),
            key,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} document(s) extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) extracted  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process the next batch of business uploads
  catalog-ocr --source uploads/unprocessed --processed uploads/processed

  # Retail uploads, ten at a time, keep the originals in place
  catalog-ocr --context retail --batch-size 10 --keep-unprocessed -o retail.json

  # Use a vision model instead of tesseract
  catalog-ocr --recognizer vision --provider openai --model gpt-4.1-mini

  # Parse an existing OCR dump without touching any store
  catalog-ocr --parse-only dump.txt

  # Full run report as JSON
  catalog-ocr --json > run.json

EXPECTED LAYOUT:
  <item name> | <code> |
  Size: 12 X 200GR
  UOM: CS
  $48.90

ENVIRONMENT VARIABLES:
  CATALOG_OCR_SOURCE      Unprocessed document directory
  CATALOG_OCR_PROCESSED   Processed document directory
  CATALOG_OCR_PROVIDER    Vision provider (openai, anthropic, gemini, ollama)
  CATALOG_OCR_MODEL       Vision model ID
  OPENAI_API_KEY          OpenAI API key (vision recognizer)
  PDFIUM_LIB_PATH         Directory containing libpdfium
"#;

/// Extract priced line items from scanned receipts and catalogs.
#[derive(Parser, Debug)]
#[command(
    name = "catalog-ocr",
    version,
    about = "Extract priced line items from scanned receipts and catalogs",
    long_about = "Take a batch of uploaded receipts (PDFs or images), OCR every page \
concurrently, parse the text into line items (name, size, unit of measure, price), and \
write the catalog as JSON. Successfully read documents are moved to the processed store.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory of documents waiting to be processed.
    #[arg(long, env = "CATALOG_OCR_SOURCE", default_value = "unprocessed")]
    source: PathBuf,

    /// Directory consumed documents are moved to.
    #[arg(long, env = "CATALOG_OCR_PROCESSED", default_value = "processed")]
    processed: PathBuf,

    /// Which uploads to consume: business (under business/) or retail.
    #[arg(long, env = "CATALOG_OCR_CONTEXT", value_enum, default_value = "business")]
    context: ContextArg,

    /// Catalog JSON output path.
    #[arg(short, long, env = "CATALOG_OCR_OUTPUT", default_value = "all-text.json")]
    output: PathBuf,

    /// Maximum documents per run.
    #[arg(long, env = "CATALOG_OCR_BATCH_SIZE", default_value_t = 5)]
    batch_size: usize,

    /// Rendering DPI for PDF pages (72–600).
    #[arg(long, env = "CATALOG_OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Maximum documents processed at once. Default: the whole batch.
    #[arg(short, long, env = "CATALOG_OCR_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-document timeout in seconds.
    #[arg(long, env = "CATALOG_OCR_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// OCR backend.
    #[arg(long, env = "CATALOG_OCR_RECOGNIZER", value_enum, default_value = "tesseract")]
    recognizer: RecognizerArg,

    /// Tesseract language code(s), e.g. eng or eng+fra.
    #[arg(long, env = "CATALOG_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Path to the tesseract executable.
    #[arg(long, env = "CATALOG_OCR_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Vision provider: openai, anthropic, gemini, ollama.
    #[arg(long)]
    provider: Option<String>,

    /// Vision model ID.
    #[arg(long)]
    model: Option<String>,

    /// Directory containing libpdfium (overrides PDFIUM_LIB_PATH).
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,

    /// Leave successfully extracted documents in the source directory.
    #[arg(long, env = "CATALOG_OCR_KEEP_UNPROCESSED")]
    keep_unprocessed: bool,

    /// Print the full run report (documents, stats, catalog) as JSON on stdout.
    #[arg(long, env = "CATALOG_OCR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CATALOG_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Parse an existing text dump and print the catalog; no OCR, no store access.
    #[arg(long, value_name = "TEXT_FILE")]
    parse_only: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CATALOG_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CATALOG_OCR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ContextArg {
    Business,
    Retail,
}

impl From<ContextArg> for ReceiptContext {
    fn from(v: ContextArg) -> Self {
        match v {
            ContextArg::Business => ReceiptContext::Business,
            ContextArg::Retail => ReceiptContext::Retail,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RecognizerArg {
    Tesseract,
    Vision,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && cli.parse_only.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Parse-only mode ──────────────────────────────────────────────────
    if let Some(ref path) = cli.parse_only {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let catalog = parse_catalog(&text);
        println!(
            "{}",
            catalog.to_json_pretty().context("Failed to serialise catalog")?
        );
        if !cli.quiet {
            eprintln!("{} items", catalog.len());
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = match cli.recognizer {
        RecognizerArg::Tesseract => {
            let factory = TesseractFactory::new()
                .binary(&cli.tesseract)
                .language(&cli.lang)
                .dpi(cli.dpi);
            let banner = factory
                .check_available()
                .await
                .context("tesseract is not usable; install it or pass --tesseract")?;
            tracing::info!("Using {}", banner);
            execute(&cli, factory, config).await?
        }
        RecognizerArg::Vision => {
            let factory = VisionFactory::resolve(cli.provider.as_deref(), cli.model.as_deref())
                .context("Failed to configure the vision recognizer")?;
            execute(&cli, factory, config).await?
        }
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} documents  {} items  {}ms  →  {}",
            if stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.succeeded,
            stats.dispatched,
            stats.items,
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        if stats.enumerated > stats.dispatched {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} more document(s) waiting for the next run",
                    stats.enumerated - stats.dispatched
                ))
            );
        }
        if !show_progress {
            for doc in output.failed_documents() {
                if let Some(ref e) = doc.error {
                    eprintln!("   {} {}", red("✗"), e);
                }
            }
        }
        for (key, reason) in &output.mark_failures {
            eprintln!("   {} could not move {}: {}", cyan("⚠"), key, dim(reason));
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .batch_size(cli.batch_size)
        .dpi(cli.dpi)
        .document_timeout_secs(cli.timeout)
        .mark_processed(!cli.keep_unprocessed);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn execute<F: RecognizerFactory>(
    cli: &Cli,
    recognizers: F,
    config: PipelineConfig,
) -> Result<PipelineOutput> {
    let mut rasterizer = PdfiumRasterizer::new();
    if let Some(ref dir) = cli.pdfium_lib {
        rasterizer = rasterizer.with_library_dir(dir);
    }

    let pipeline = Pipeline::new(
        FsDocumentSource::new(&cli.source, &cli.processed),
        JsonFileSink::new(&cli.output),
        Arc::new(rasterizer),
        recognizers,
        config,
    );

    pipeline
        .run(cli.context.into())
        .await
        .context("Extraction run failed")
}
