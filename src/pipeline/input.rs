//! Input resolution: validate the source path and derive the output path.
//!
//! We check the PDF magic bytes (`%PDF`) before handing the file to pdfium so
//! callers get a meaningful configuration error instead of a pdfium failure
//! message, and so no window is ever submitted for a non-PDF file.

use crate::error::PipelineError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the input stem for the default output file.
pub const OUTPUT_SUFFIX: &str = "_google_doc_ai_layout_parser.md";

/// Validate that `path` exists, is readable, and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, PipelineError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(PipelineError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic != b"%PDF" => {
                    return Err(PipelineError::NotAPdf { path, magic });
                }
                Ok(()) => {}
                Err(e) => {
                    return Err(PipelineError::SourceUnreadable {
                        path,
                        detail: format!("file too short to be a PDF: {e}"),
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied { path });
        }
        Err(e) => {
            return Err(PipelineError::SourceUnreadable {
                path,
                detail: e.to_string(),
            });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// `<dir>/<stem>_google_doc_ai_layout_parser.md` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}"))
}
