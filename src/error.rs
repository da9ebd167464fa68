//! Error types for the edgequake-docai library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`]: **Fatal**: the job cannot proceed or produced nothing
//!   (missing file, missing processor id, every window failed). Returned as
//!   `Err(PipelineError)` from [`crate::extract()`] and
//!   [`crate::pipeline::orchestrator::Pipeline::run`]. No output file is
//!   written when one of these is returned.
//!
//! * [`WindowError`]: **Non-fatal**: one page window failed (HTTP 500, empty
//!   chunk list, connection reset) but the remaining windows still run. Stored
//!   inside [`crate::output::WindowReport`] so callers can see exactly which
//!   page ranges are missing from the merged document and why.

use crate::pipeline::partition::Window;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docai library.
///
/// Window-level failures use [`WindowError`] and are stored in
/// [`crate::output::WindowReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The PDF could not be opened or its pages could not be counted.
    #[error("Cannot open source document '{path}': {detail}")]
    SourceUnreadable { path: PathBuf, detail: String },

    /// A required Document AI setting is absent.
    #[error("Missing Document AI setting '{name}'.\n{hint}")]
    MissingSetting { name: &'static str, hint: String },

    /// Builder or service validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Job outcome errors ────────────────────────────────────────────────
    /// Every window failed, or the document had no pages.
    #[error("No data extracted: {} of {windows} windows failed{}", failures.len(), first_failure(failures))]
    NoDataExtracted {
        windows: usize,
        failures: Vec<(Window, WindowError)>,
    },

    /// Some windows failed; raised by [`crate::output::JobReport::into_result`]
    /// for callers that treat any missing page range as fatal.
    #[error("{}/{windows} windows failed: {}", failures.len(), failed_ranges(failures))]
    PartialExtraction {
        windows: usize,
        failures: Vec<(Window, WindowError)>,
    },

    /// The job was cancelled between two windows.
    #[error("Cancelled after {completed}/{total} windows; no output written")]
    Cancelled { completed: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// `true` for errors raised while validating the job before any window ran.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PipelineError::FileNotFound { .. }
                | PipelineError::PermissionDenied { .. }
                | PipelineError::NotAPdf { .. }
                | PipelineError::SourceUnreadable { .. }
                | PipelineError::MissingSetting { .. }
                | PipelineError::InvalidConfig(_)
                | PipelineError::PdfiumBindingFailed(_)
        )
    }
}

fn first_failure(failures: &[(Window, WindowError)]) -> String {
    match failures.first() {
        Some((window, err)) => format!("\nFirst error (pages {}): {}", window.page_label(), err),
        None => String::new(),
    }
}

fn failed_ranges(failures: &[(Window, WindowError)]) -> String {
    failures
        .iter()
        .map(|(window, err)| format!("pages {}: {}", window.page_label(), err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A non-fatal error for a single page window.
///
/// The job continues with the next window; the failed window's pages are
/// simply absent from the merged output.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum WindowError {
    /// Document AI answered with a non-success HTTP status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Document AI answered 2xx but the chunked document was missing or empty.
    #[error("service returned no chunks")]
    EmptyResult,

    /// The request never produced a response (connect failure, timeout, TLS).
    #[error("transport error{}: {detail}", if *timed_out { " (timed out)" } else { "" })]
    Transport { detail: String, timed_out: bool },

    /// A fresh access token could not be obtained before the call.
    #[error("could not refresh access token: {detail}")]
    Credentials { detail: String },

    /// The sub-document for the window could not be produced.
    #[error("could not build sub-document: {detail}")]
    Serialization { detail: String },
}
