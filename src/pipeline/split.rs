//! Source document access: page counting and per-window sub-documents.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state; it must not run on a
//! Tokio worker thread. Every pdfium call below runs inside
//! `tokio::task::spawn_blocking` with its own binding, and only owned bytes
//! cross the thread boundary.

use crate::error::{PipelineError, WindowError};
use crate::pipeline::input;
use crate::pipeline::partition::Window;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Opens a source document. Failures are configuration errors.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Box<dyn PageSource>, PipelineError>;
}

/// An opened source document.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Total number of pages.
    fn page_count(&self) -> usize;

    /// Bytes of a standalone document holding exactly `window`'s pages, in order.
    async fn serialize_window(&self, window: Window) -> Result<Vec<u8>, WindowError>;
}

/// Reads PDFs through pdfium.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumReader;

#[async_trait]
impl DocumentReader for PdfiumReader {
    async fn open(&self, path: &Path) -> Result<Box<dyn PageSource>, PipelineError> {
        let path = input::resolve_local(path)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| PipelineError::SourceUnreadable {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        let bytes = Arc::new(bytes);

        let shared = Arc::clone(&bytes);
        let count_path = path.clone();
        let page_count = tokio::task::spawn_blocking(move || count_pages(&count_path, &shared))
            .await
            .map_err(|e| PipelineError::Internal(format!("Page-count task panicked: {e}")))??;

        info!("PDF loaded: {} pages ({} bytes)", page_count, bytes.len());
        Ok(Box::new(PdfSource {
            path,
            bytes,
            page_count,
        }))
    }
}

/// A PDF held in memory.
pub struct PdfSource {
    path: PathBuf,
    bytes: Arc<Vec<u8>>,
    page_count: usize,
}

impl PdfSource {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PageSource for PdfSource {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn serialize_window(&self, window: Window) -> Result<Vec<u8>, WindowError> {
        let bytes = Arc::clone(&self.bytes);
        tokio::task::spawn_blocking(move || extract_window_blocking(&bytes, window))
            .await
            .map_err(|e| WindowError::Serialization {
                detail: format!("split task panicked: {e}"),
            })?
    }
}

fn bind() -> Result<Pdfium, String> {
    pdfium_auto::bind_pdfium_silent().map_err(|e| e.to_string())
}

fn count_pages(path: &Path, bytes: &[u8]) -> Result<usize, PipelineError> {
    let pdfium = bind().map_err(PipelineError::PdfiumBindingFailed)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PipelineError::SourceUnreadable {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;
    Ok(document.pages().len() as usize)
}

/// Copy `window`'s pages into a fresh document and serialise it.
fn extract_window_blocking(bytes: &[u8], window: Window) -> Result<Vec<u8>, WindowError> {
    let fail = |detail: String| WindowError::Serialization { detail };

    let pdfium = bind().map_err(fail)?;
    let source = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| fail(format!("reload source: {e:?}")))?;

    let first = PdfPageIndex::try_from(window.start)
        .map_err(|_| fail(format!("page {} out of pdfium range", window.start)))?;
    let last = PdfPageIndex::try_from(window.end - 1)
        .map_err(|_| fail(format!("page {} out of pdfium range", window.end - 1)))?;

    let mut target = pdfium
        .create_new_pdf()
        .map_err(|e| fail(format!("create document: {e:?}")))?;
    target
        .pages_mut()
        .copy_page_range_from_document(&source, first..=last, 0)
        .map_err(|e| fail(format!("copy pages {}: {e:?}", window.page_label())))?;

    let out = target
        .save_to_bytes()
        .map_err(|e| fail(format!("save: {e:?}")))?;
    debug!("Window {} → {} bytes", window, out.len());
    Ok(out)
}
