//! Result types: chunks, per-window outcomes, and the job report.

use crate::error::{PipelineError, WindowError};
use crate::pipeline::partition::Window;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One unit of structured content returned by Document AI for a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Position within the window's chunk list, as assigned by the service.
    pub ordinal: usize,
    /// Service-side chunk id (`"c1"`, `"c2"`, …) when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    pub content: String,
}

impl ContentChunk {
    pub fn new(ordinal: usize, content: impl Into<String>) -> Self {
        Self {
            ordinal,
            chunk_id: None,
            content: content.into(),
        }
    }

    /// Global order key of this chunk once it is known to belong to `window`.
    pub fn order_key(&self, window: Window) -> (usize, usize) {
        (window.start, self.ordinal)
    }
}

/// Result of submitting one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    Succeeded(Vec<ContentChunk>),
    Failed(WindowError),
}

impl From<Result<Vec<ContentChunk>, WindowError>> for WindowOutcome {
    fn from(result: Result<Vec<ContentChunk>, WindowError>) -> Self {
        match result {
            Ok(chunks) => WindowOutcome::Succeeded(chunks),
            Err(e) => WindowOutcome::Failed(e),
        }
    }
}

/// What happened to a single window, without the chunk text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: Window,
    pub chunk_count: usize,
    pub payload_bytes: usize,
    pub duration_ms: u64,
    /// `None` when the window succeeded.
    pub error: Option<WindowError>,
}

impl WindowReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub total_pages: usize,
    pub window_size: usize,
    pub windows: usize,
    pub succeeded_windows: usize,
    pub failed_windows: usize,
    pub chunks: usize,
    pub output_chars: usize,
    pub total_duration_ms: u64,
    pub api_duration_ms: u64,
}

/// Full result of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Merged text that was written to `output`.
    pub text: String,
    pub windows: Vec<WindowReport>,
    pub stats: JobStats,
}

impl JobReport {
    /// Windows that failed, with the reason, in page order.
    pub fn failed_windows(&self) -> impl Iterator<Item = (Window, &WindowError)> {
        self.windows
            .iter()
            .filter_map(|w| w.error.as_ref().map(|e| (w.window, e)))
    }

    /// Returns `Err(PipelineError::PartialExtraction)` when any window failed;
    /// for callers that want all-or-nothing semantics.
    pub fn into_result(self) -> Result<Self, PipelineError> {
        let failures: Vec<(Window, WindowError)> = self
            .failed_windows()
            .map(|(w, e)| (w, e.clone()))
            .collect();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(PipelineError::PartialExtraction {
                windows: self.stats.windows,
                failures,
            })
        }
    }
}

/// Write `text` to `path`, replacing any existing file.
///
/// The text goes to a [`tempfile::NamedTempFile`] in the target directory
/// which is then persisted over `path`, so readers never see a partial file
/// and a failed write leaves no stray temp file.
pub async fn write_output(path: &Path, text: &str) -> Result<(), PipelineError> {
    let path = path.to_path_buf();
    let text = text.to_owned();
    let target = path.clone();

    tokio::task::spawn_blocking(move || {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Output task panicked: {e}")))?
    .map_err(|source| PipelineError::OutputWriteFailed { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_output_overwrites_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.md");

        write_output(&path, "old").await.unwrap();
        write_output(&path, "# 제목\n\n본문 — ünïcödé").await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "# 제목\n\n본문 — ünïcödé");
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1, "staging file left next to the output");
    }

    #[test]
    fn outcome_from_result() {
        let ok: WindowOutcome = Ok(vec![ContentChunk::new(0, "A")]).into();
        assert!(matches!(ok, WindowOutcome::Succeeded(ref c) if c.len() == 1));

        let err: WindowOutcome = Err(WindowError::EmptyResult).into();
        assert_eq!(err, WindowOutcome::Failed(WindowError::EmptyResult));
    }

    #[test]
    fn report_lists_failed_ranges() {
        let report = JobReport {
            input: "in.pdf".into(),
            output: "out.md".into(),
            text: "A".into(),
            windows: vec![
                WindowReport {
                    window: Window::new(0, 15),
                    chunk_count: 1,
                    payload_bytes: 10,
                    duration_ms: 5,
                    error: None,
                },
                WindowReport {
                    window: Window::new(15, 20),
                    chunk_count: 0,
                    payload_bytes: 10,
                    duration_ms: 5,
                    error: Some(WindowError::EmptyResult),
                },
            ],
            stats: JobStats {
                windows: 2,
                ..Default::default()
            },
        };

        let failed: Vec<_> = report.failed_windows().collect();
        assert_eq!(failed, vec![(Window::new(15, 20), &WindowError::EmptyResult)]);

        let err = report.into_result().unwrap_err();
        assert!(!err.is_configuration_error());
        let msg = err.to_string();
        assert!(msg.contains("1/2 windows failed"), "got: {msg}");
        assert!(msg.contains("16~20"), "got: {msg}");
        match err {
            PipelineError::PartialExtraction { windows, failures } => {
                assert_eq!(windows, 2);
                assert_eq!(failures, vec![(Window::new(15, 20), WindowError::EmptyResult)]);
            }
            other => panic!("expected PartialExtraction, got {other:?}"),
        }
    }

    #[test]
    fn report_serialises_to_json() {
        let report = JobReport {
            input: "in.pdf".into(),
            output: "out.md".into(),
            text: String::new(),
            windows: vec![],
            stats: JobStats::default(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"stats\""));
    }
}
