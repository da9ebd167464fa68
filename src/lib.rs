//! # edgequake-docai
//!
//! Convert large PDFs to Markdown with the Google Document AI Layout Parser.
//!
//! ## Why this crate?
//!
//! The Layout Parser's synchronous endpoint accepts only a limited number of
//! pages per request and a per-minute quota per project. Long reports and
//! scanned books therefore have to be cut into page windows, submitted one at
//! a time with pacing, and stitched back together in page order. One bad
//! window (a 500, an empty response, a dropped connection) should cost only
//! its own pages, not the whole run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate path + %PDF magic
//!  ├─ 2. Partition  [0,15) [15,30) [30,32) …
//!  ├─ 3. Split      pdfium copies each window into a sub-document (spawn_blocking)
//!  ├─ 4. Document AI  one :process call per window, chunked layout output
//!  ├─ 5. Pace       fixed delay (or token bucket) after every call
//!  ├─ 6. Merge      chunks joined with blank lines, failed windows skipped
//!  └─ 7. Output     <stem>_google_doc_ai_layout_parser.md + per-window report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docai::{extract, ExtractionConfig, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GCP_PROJECT_ID / GCP_PROCESSOR_ID / GCP_LOCATION / GCP_ACCESS_TOKEN
//!     let config = ExtractionConfig::builder()
//!         .service(ServiceConfig::from_env())
//!         .build()?;
//!     let report = extract("report.pdf", &config).await?;
//!     for (window, err) in report.failed_windows() {
//!         eprintln!("pages {} missing: {}", window.page_label(), err);
//!     }
//!     println!("{}", report.output.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `docai2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ServiceConfig};
pub use error::{PipelineError, WindowError};
pub use extract::{
    extract, extract_sync, extract_to_file, extract_with_cancellation, inspect, Inspection,
};
pub use output::{ContentChunk, JobReport, JobStats, WindowOutcome, WindowReport};
pub use pipeline::aggregate::Aggregator;
pub use pipeline::docai::{
    AccessToken, DocumentAiClient, ExtractionClient, GcloudTokenSource, TokenSource,
};
pub use pipeline::orchestrator::{Job, JobState, Pipeline};
pub use pipeline::pacing::{FixedDelayPacer, NoPacing, Pacer, QuotaPacer};
pub use pipeline::partition::{Partitioner, Window};
pub use pipeline::split::{DocumentReader, PageSource, PdfiumReader};
pub use progress::{
    format_duration, NoopObserver, PipelineObserver, ProgressCallback, TracingObserver,
};
pub use tokio_util::sync::CancellationToken;
