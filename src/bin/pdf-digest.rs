//! CLI binary for pdf-digest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DigestConfig`, writes artifacts under an output directory and prints
//! the keyed response.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_digest::{
    DigestConfig, DigestOutput, DigestProgressCallback, Digester, DirStore, ProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

/// Terminal progress: one bar per document, re-armed on every
/// `on_document_start`, plus a log line per chunk. Chunks may complete out
/// of order when concurrency > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Wall-clock start per (document, chunk).
    start_times: Mutex<HashMap<(String, usize), Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, document: &str, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(document.to_string());
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, document: &str, index: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&(document.to_string(), index)))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_run_start(&self, documents: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Digesting {documents} document(s)…"))
        ));
    }

    fn on_document_start(&self, document: &str, chunks: usize) {
        self.activate_bar(document, chunks);
    }

    fn on_chunk_start(&self, document: &str, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert((document.to_string(), index), Instant::now());
        }
        self.bar.set_message(format!("chunk {}", index + 1));
    }

    fn on_chunk_complete(&self, document: &str, index: usize, total: usize, summary_len: usize) {
        let elapsed_ms = self.elapsed_ms(document, index);
        self.bar.println(format!(
            "  {} {} chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            document,
            index + 1,
            total,
            dim(&format!("{summary_len:>5} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, document: &str, index: usize, total: usize, error: &str) {
        let elapsed_ms = self.elapsed_ms(document, index);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {} chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            document,
            index + 1,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, document: &str, ok_chunks: usize, total: usize) {
        let failed = total.saturating_sub(ok_chunks);
        let mark = if total == 0 || failed == total {
            red("✘")
        } else if failed > 0 {
            cyan("⚠")
        } else {
            green("✔")
        };
        self.bar.println(format!(
            "{} {}  {}/{} chunks summarised",
            mark,
            bold(document),
            ok_chunks,
            total
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise one PDF with a local model
  pdf-digest paper.pdf

  # Summarise every PDF in a bundle, artifacts under ./run
  pdf-digest papers.tar.gz --out-dir run

  # A directory of PDFs, four chunks in flight
  pdf-digest ./papers -c 4

  # From a URL, JSON response
  pdf-digest https://arxiv.org/pdf/1706.03762 --json

  # Hosted provider instead of the local generate endpoint
  pdf-digest --provider openai --model gpt-4.1-nano paper.pdf

ARTIFACTS:
  <out-dir>/figures/<doc>/<doc>_page<p>_img<i>.<ext>   embedded images
  <out-dir>/figures/<doc>/vector_figure_<p>_<n>.png    vector regions
  <out-dir>/summaries/<doc>_summary.pdf                summary document

ENVIRONMENT VARIABLES:
  PDF_DIGEST_*            Fallback for every flag (e.g. PDF_DIGEST_MODEL)
  PDFIUM_LIB_PATH         Directory or file of the pdfium shared library
  RUST_LOG                Log filter override
"#;

/// Summarise PDF documents chunk by chunk and extract their figures.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-digest",
    version,
    about = "Summarise PDF documents chunk by chunk and extract their figures",
    long_about = "Summarise PDF documents (local files, .tar.gz bundles, directories or URLs) \
chunk by chunk with a language model, extract embedded images and vector figures, and render \
each summary as a PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file, .tar.gz bundle, directory, or HTTP/HTTPS URL.
    input: String,

    /// Directory receiving figures and summary documents.
    #[arg(short, long, env = "PDF_DIGEST_OUT_DIR", default_value = "digest-output")]
    out_dir: PathBuf,

    /// Model requested from the backend.
    #[arg(long, env = "PDF_DIGEST_MODEL", default_value = pdf_digest::config::DEFAULT_MODEL)]
    model: String,

    /// Generate endpoint URL.
    #[arg(long, env = "PDF_DIGEST_ENDPOINT", default_value = pdf_digest::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Bearer token for a remote generate endpoint.
    #[arg(long, env = "PDF_DIGEST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Hosted provider (openai, anthropic, gemini, ...). Overrides --endpoint.
    #[arg(long, env = "PDF_DIGEST_PROVIDER")]
    provider: Option<String>,

    /// Maximum chunk length in characters.
    #[arg(long, env = "PDF_DIGEST_CHUNK_SIZE", default_value_t = 3000)]
    chunk_size: usize,

    /// Per-chunk backend timeout in seconds.
    #[arg(long, env = "PDF_DIGEST_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Number of chunks in flight at once.
    #[arg(short, long, env = "PDF_DIGEST_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Path to a text file with a custom summarisation instruction.
    #[arg(long, env = "PDF_DIGEST_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Vector regions must exceed this size in both dimensions.
    #[arg(long, env = "PDF_DIGEST_MIN_FIGURE_SIZE", default_value_t = 100.0)]
    min_figure_size: f32,

    /// Zoom factor for rasterising vector regions.
    #[arg(long, env = "PDF_DIGEST_FIGURE_ZOOM", default_value_t = 2.0)]
    figure_zoom: f32,

    /// Title printed at the top of each summary document.
    #[arg(long, env = "PDF_DIGEST_TITLE", default_value = "Summary")]
    title: String,

    /// Explicit pdfium shared library path.
    #[arg(long, env = "PDF_DIGEST_PDFIUM")]
    pdfium: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF_DIGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the response as JSON instead of plain text.
    #[arg(long, env = "PDF_DIGEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_DIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_DIGEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn DigestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let store = Arc::new(
        DirStore::new(&cli.out_dir)
            .with_context(|| format!("Failed to prepare {}", cli.out_dir.display()))?,
    );
    let digester = Digester::new(config, store).context("Failed to set up backend")?;
    let output = digester.digest(&cli.input).await.context("Digest failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output.response())
            .context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_text(&output).context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        let s = &output.stats;
        eprintln!(
            "{}  {} document(s)  {} chunk(s)  {} figure(s)  {}ms  →  {}",
            if s.failed_chunks == 0 && s.empty_documents == 0 && s.unreadable_documents == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            s.documents,
            s.total_chunks,
            s.figures,
            s.total_duration_ms,
            bold(&cli.out_dir.display().to_string()),
        );
        if s.failed_chunks > 0 {
            eprintln!("   {} chunk(s) failed", red(&s.failed_chunks.to_string()));
        }
        if s.unreadable_documents > 0 {
            eprintln!(
                "   {} document(s) could not be read",
                red(&s.unreadable_documents.to_string())
            );
        }
    }

    Ok(())
}

/// Plain-text rendition of the response, one block per document.
fn print_text(output: &DigestOutput) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for doc in &output.documents {
        writeln!(handle, "== {} ==", doc.id)?;
        writeln!(handle, "{}", doc.summary_text())?;
        if !doc.figures.is_empty() {
            writeln!(handle, "\nFigures:")?;
            for fig in &doc.figures {
                writeln!(handle, "  {}", fig.location)?;
            }
        }
        if let Some(ref artifact) = doc.artifact {
            writeln!(handle, "\nSummary document: {}", artifact.location)?;
        }
        writeln!(handle)?;
    }
    Ok(())
}

/// Map CLI args to `DigestConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DigestConfig> {
    let mut builder = DigestConfig::builder()
        .chunk_size(cli.chunk_size)
        .model(cli.model.clone())
        .endpoint(cli.endpoint.clone())
        .request_timeout_secs(cli.timeout)
        .concurrency(cli.concurrency)
        .min_figure_size(cli.min_figure_size)
        .figure_zoom(cli.figure_zoom)
        .download_timeout_secs(cli.download_timeout)
        .summary_title(cli.title.clone());

    if let Some(ref path) = cli.instruction {
        let instruction = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(instruction);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref lib) = cli.pdfium {
        builder = builder.pdfium_library(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
