//! High-level entry points wiring the real collaborators together.
//!
//! [`extract`] opens the PDF with pdfium, calls Document AI over HTTPS and
//! writes the merged Markdown. Library users who need a different reader,
//! client or pacer build a [`Pipeline`] directly.

use crate::config::ExtractionConfig;
use crate::error::PipelineError;
use crate::output::JobReport;
use crate::pipeline::docai::DocumentAiClient;
use crate::pipeline::input::default_output_path;
use crate::pipeline::orchestrator::{plan, Pipeline};
use crate::pipeline::partition::Window;
use crate::pipeline::split::PdfiumReader;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Extract `input` and write the result next to it
/// (`<stem>_google_doc_ai_layout_parser.md`).
pub async fn extract(
    input: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<JobReport, PipelineError> {
    let input = input.as_ref();
    extract_to_file(input, default_output_path(input), config).await
}

/// Extract `input` and write the merged Markdown to `output`.
///
/// # Errors
/// Returns `Err(PipelineError)` only for job-level failures: invalid
/// configuration, unreadable source, or no window produced any text. Failed
/// windows are listed in [`JobReport::windows`].
pub async fn extract_to_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<JobReport, PipelineError> {
    extract_with_cancellation(input, output, config, CancellationToken::new()).await
}

/// Like [`extract_to_file`], stopping between windows once `cancel` fires.
pub async fn extract_with_cancellation(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ExtractionConfig,
    cancel: CancellationToken,
) -> Result<JobReport, PipelineError> {
    let input = input.as_ref();
    let output = output.as_ref();
    info!("Starting extraction: {}", input.display());

    let client = DocumentAiClient::from_config(config)?;
    info!("Document AI endpoint: {}", client.url());

    let mut pipeline = Pipeline::new(config.clone(), Arc::new(PdfiumReader), Arc::new(client))
        .with_cancellation(cancel);
    pipeline.run(input, output).await
}

/// Synchronous wrapper around [`extract_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<JobReport, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_to_file(input, output, config))
}

/// Page count and window plan for a PDF, without calling Document AI.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub input: PathBuf,
    pub default_output: PathBuf,
    pub total_pages: usize,
    pub window_size: usize,
    pub windows: Vec<Window>,
}

/// Plan the job for `input` without credentials or network access.
pub async fn inspect(
    input: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Inspection, PipelineError> {
    let input = input.as_ref();
    let partitioner = plan(&PdfiumReader, input, config).await?;
    Ok(Inspection {
        input: input.to_path_buf(),
        default_output: default_output_path(input),
        total_pages: partitioner.total_pages(),
        window_size: partitioner.window_size(),
        windows: partitioner.windows().collect(),
    })
}
