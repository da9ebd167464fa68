//! CLI binary for edgequake-docai.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one job and prints the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docai::{
    extract_with_cancellation, format_duration, inspect, pipeline::input::default_output_path,
    CancellationToken, ExtractionConfig, JobReport, PipelineError, PipelineObserver,
    ProgressCallback, ServiceConfig, Window, WindowError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal observer: a live bar over windows plus one log line per window.
struct CliProgressObserver {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressObserver {
    /// The bar starts as a spinner; `on_job_start` sizes it once the page
    /// count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, windows: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} windows  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(windows as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl PipelineObserver for CliProgressObserver {
    fn on_job_start(&self, total_pages: usize, window_count: usize) {
        self.activate_bar(window_count);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Submitting {total_pages} pages in {window_count} windows…"
            ))
        ));
    }

    fn on_window_start(&self, window: Window, _index: usize, _count: usize) {
        self.bar.set_message(format!("pages {}", window.page_label()));
    }

    fn on_window_complete(&self, window: Window, chunk_count: usize, elapsed: Duration) {
        self.bar.println(format!(
            "  {} Pages {:<9}  {:<10}  {}",
            green("✓"),
            window.page_label(),
            dim(&format!("{chunk_count:>4} chunks")),
            dim(&format_duration(elapsed)),
        ));
        self.bar.inc(1);
    }

    fn on_window_error(&self, window: Window, error: &WindowError, elapsed: Duration) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let mut msg = error.to_string();
        if msg.chars().count() > 80 {
            msg = msg.chars().take(79).collect::<String>() + "\u{2026}";
        }

        self.bar.println(format!(
            "  {} Pages {:<9}  {}  {}",
            red("✗"),
            window.page_label(),
            red(&msg),
            dim(&format_duration(elapsed)),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, report: &JobReport) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} windows extracted successfully",
                green("✔"),
                bold(&report.stats.windows.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} windows extracted  ({} skipped)",
                cyan("⚠"),
                bold(&report.stats.succeeded_windows.to_string()),
                report.stats.windows,
                red(&failed.to_string()),
            );
        }
    }

    fn on_job_failed(&self, _error: &PipelineError) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract next to the input (report_google_doc_ai_layout_parser.md)
  docai2md report.pdf

  # Explicit output, smaller windows, slower pacing
  docai2md report.pdf -o report.md --window-size 10 --delay-ms 1000

  # Token-bucket pacing instead of a fixed delay
  docai2md book.pdf --max-calls-per-minute 120

  # Show the window plan (no credentials needed)
  docai2md --inspect-only book.pdf

  # Machine-readable job report
  docai2md --json report.pdf > report.json

ENVIRONMENT VARIABLES (also read from .env):
  GCP_PROJECT_ID          Google Cloud project id (required)
  GCP_PROCESSOR_ID        Layout Parser processor id (required)
  GCP_LOCATION            Processor region: us or eu (default: us)
  GCP_PROCESSOR_VERSION   Processor version (default: pretrained-layout-parser-v1.5-2025-08-25)
  GCP_ACCESS_TOKEN        OAuth2 bearer token; falls back to `gcloud auth print-access-token`
  DOCUMENTAI_ENDPOINT     Override the regional endpoint base URL
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  RUST_LOG                Override the log filter

SETUP:
  1. gcloud auth login   (or export GCP_ACCESS_TOKEN=...)
  2. export GCP_PROJECT_ID=... GCP_PROCESSOR_ID=...
  3. docai2md document.pdf

  PDFium (~30 MB) is downloaded automatically on first run and cached.
"#;

/// Convert PDFs to Markdown with the Google Document AI Layout Parser.
#[derive(Parser, Debug)]
#[command(
    name = "docai2md",
    version,
    about = "Convert PDFs to Markdown with the Google Document AI Layout Parser",
    long_about = "Split a PDF into page windows, submit each window to a Document AI \
Layout Parser processor, and merge the returned chunks into one Markdown file. \
Windows that fail are reported and skipped.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Output Markdown file. Default: <stem>_google_doc_ai_layout_parser.md next to the input.
    #[arg(short, long, env = "DOCAI2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Pages per Document AI request.
    #[arg(long, env = "DOCAI2MD_WINDOW_SIZE", default_value_t = 15,
          value_parser = clap::value_parser!(u64).range(1..))]
    window_size: u64,

    /// Delay after each request, in milliseconds.
    #[arg(long, env = "DOCAI2MD_DELAY_MS", default_value_t = 500)]
    delay_ms: u64,

    /// Token-bucket pacing: at most N requests per minute (replaces --delay-ms).
    #[arg(long, env = "DOCAI2MD_MAX_CALLS_PER_MINUTE")]
    max_calls_per_minute: Option<u32>,

    /// Google Cloud project id.
    #[arg(long, env = "GCP_PROJECT_ID")]
    project_id: Option<String>,

    /// Processor region.
    #[arg(long, env = "GCP_LOCATION", default_value = "us")]
    location: String,

    /// Layout Parser processor id.
    #[arg(long, env = "GCP_PROCESSOR_ID")]
    processor_id: Option<String>,

    /// Processor version.
    #[arg(long, env = "GCP_PROCESSOR_VERSION",
          default_value = edgequake_docai::config::DEFAULT_PROCESSOR_VERSION)]
    processor_version: String,

    /// Endpoint base URL override.
    #[arg(long, env = "DOCUMENTAI_ENDPOINT")]
    endpoint: Option<String>,

    /// OAuth2 bearer token.
    #[arg(long, env = "GCP_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Layout Parser chunk size.
    #[arg(long, env = "DOCAI2MD_CHUNK_SIZE", default_value_t = 1024)]
    chunk_size: u32,

    /// Do not prefix chunks with their ancestor headings.
    #[arg(long)]
    no_ancestor_headings: bool,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DOCAI2MD_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Print the job report (JobReport) as JSON on stdout.
    #[arg(long, env = "DOCAI2MD_JSON")]
    json: bool,

    /// Print page count and window plan only; no service calls.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCAI2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs (includes every chunk's text).
    #[arg(short, long, env = "DOCAI2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCAI2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    // ── Ensure PDFium engine is available ───────────────────────────────────
    if !pdfium_auto::is_pdfium_cached() {
        if !cli.quiet {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length().unwrap_or(0) != t {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDFium engine")?;

            dl_bar.finish_with_message("ready ✓");
        } else {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressObserver::new_dynamic() as Arc<dyn PipelineObserver>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let plan = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?
            );
        } else {
            println!("File:         {}", plan.input.display());
            println!("Pages:        {}", plan.total_pages);
            println!("Window size:  {}", plan.window_size);
            println!("Windows:      {}", plan.windows.len());
            for w in &plan.windows {
                println!("  pages {:<9} {}", w.page_label(), dim(&w.to_string()));
            }
            println!("Output:       {}", plan.default_output.display());
        }
        return Ok(());
    }

    // ── Ctrl-C stops between windows ─────────────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let report = extract_with_cancellation(&cli.input, &output, &config, cancel)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &report.stats;
        eprintln!(
            "{}  {}/{} windows  {} pages  {} chunks  {}  →  {}",
            if stats.failed_windows == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.succeeded_windows,
            stats.windows,
            stats.total_pages,
            stats.chunks,
            format_duration(Duration::from_millis(stats.total_duration_ms)),
            bold(&report.output.display().to_string()),
        );
        for (window, err) in report.failed_windows() {
            eprintln!("   {} pages {}: {}", red("✗"), window.page_label(), err);
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let service = ServiceConfig {
        project_id: cli.project_id.clone(),
        location: cli.location.clone(),
        processor_id: cli.processor_id.clone(),
        processor_version: cli.processor_version.clone(),
        endpoint: cli.endpoint.clone(),
        access_token: cli.access_token.clone(),
    };

    let mut builder = ExtractionConfig::builder()
        .window_size(cli.window_size as usize)
        .min_call_interval_ms(cli.delay_ms)
        .service(service)
        .chunk_size(cli.chunk_size)
        .include_ancestor_headings(!cli.no_ancestor_headings)
        .api_timeout_secs(cli.api_timeout);

    if let Some(n) = cli.max_calls_per_minute {
        builder = builder.max_calls_per_minute(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
