//! The job state machine: partition → submit → pace → aggregate → write.
//!
//! ```text
//! Initializing ──(config, source, token ok)──▶ Running ──(text non-empty)──▶ Completed
//!      │                                        │
//!      └──(ConfigurationError)──▶ Failed ◀──────┴──(NoDataExtracted / Cancelled)
//! ```
//!
//! Windows run strictly one after another. A window that fails is reported
//! and skipped; only configuration problems, an empty result, or
//! cancellation end the job early, and none of those write a file.

use crate::config::ExtractionConfig;
use crate::error::{PipelineError, WindowError};
use crate::output::{write_output, JobReport, JobStats, WindowOutcome, WindowReport};
use crate::pipeline::aggregate::Aggregator;
use crate::pipeline::docai::ExtractionClient;
use crate::pipeline::pacing::Pacer;
use crate::pipeline::partition::{Partitioner, Window};
use crate::pipeline::split::DocumentReader;
use crate::progress::{PipelineObserver, TracingObserver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Initializing,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One job's immutable parameters, fixed once the source is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub window_size: usize,
    pub total_pages: usize,
}

/// Runs exactly one job. Build a new `Pipeline` for the next document.
pub struct Pipeline {
    config: ExtractionConfig,
    reader: Arc<dyn DocumentReader>,
    client: Arc<dyn ExtractionClient>,
    pacer: Arc<dyn Pacer>,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancellationToken,
    state: JobState,
}

impl Pipeline {
    /// Pacing comes from `config` unless overridden with [`Pipeline::with_pacer`];
    /// the observer is `config.progress_callback` or [`TracingObserver`].
    pub fn new(
        config: ExtractionConfig,
        reader: Arc<dyn DocumentReader>,
        client: Arc<dyn ExtractionClient>,
    ) -> Self {
        let pacer = config.pacer();
        let observer = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(TracingObserver));
        Self {
            config,
            reader,
            client,
            pacer,
            observer,
            cancel: CancellationToken::new(),
            state: JobState::Initializing,
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Stop between windows once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run the job for `input`, writing the merged text to `output`.
    pub async fn run(&mut self, input: &Path, output: &Path) -> Result<JobReport, PipelineError> {
        if self.state != JobState::Initializing {
            return Err(PipelineError::Internal(format!(
                "pipeline already used (state {:?}); create a new one per job",
                self.state
            )));
        }

        let result = self.run_inner(input, output).await;
        match &result {
            Ok(report) => {
                self.state = JobState::Completed;
                self.observer.on_job_complete(report);
            }
            Err(e) => {
                self.state = JobState::Failed;
                self.observer.on_job_failed(e);
            }
        }
        result
    }

    async fn run_inner(&mut self, input: &Path, output: &Path) -> Result<JobReport, PipelineError> {
        let started = Instant::now();

        // ── Initializing ─────────────────────────────────────────────────
        self.config.service.validate()?;
        let source = self.reader.open(input).await?;
        self.client.prepare().await?;
        let job = Job {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            window_size: self.config.window_size.get(),
            total_pages: source.page_count(),
        };
        debug!("Job ready: {:?}", job);

        // ── Running ──────────────────────────────────────────────────────
        self.state = JobState::Running;
        let partitioner = Partitioner::new(job.total_pages, self.config.window_size);
        let window_count = partitioner.window_count();
        self.observer.on_job_start(job.total_pages, window_count);

        let mut aggregator = Aggregator::new();
        let mut reports = Vec::with_capacity(window_count);
        let mut api_time = Duration::ZERO;

        for (index, window) in partitioner.windows().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    completed: index,
                    total: window_count,
                });
            }

            self.observer.on_window_start(window, index, window_count);
            let window_start = Instant::now();

            let (outcome, payload_bytes) = match source.serialize_window(window).await {
                Ok(payload) => {
                    let call_start = Instant::now();
                    let result = self.client.extract(&payload).await;
                    api_time += call_start.elapsed();
                    (WindowOutcome::from(result), payload.len())
                }
                Err(e) => (WindowOutcome::Failed(e), 0),
            };
            let elapsed = window_start.elapsed();

            let report = match outcome {
                WindowOutcome::Succeeded(chunks) => {
                    self.observer.on_window_complete(window, chunks.len(), elapsed);
                    for chunk in &chunks {
                        debug!(
                            "Chunk {} of pages {}:\n{}",
                            chunk.ordinal,
                            window.page_label(),
                            chunk.content
                        );
                    }
                    let report = window_report(window, chunks.len(), payload_bytes, elapsed, None);
                    aggregator.append(window, chunks);
                    report
                }
                WindowOutcome::Failed(err) => {
                    self.observer.on_window_error(window, &err, elapsed);
                    window_report(window, 0, payload_bytes, elapsed, Some(err))
                }
            };
            reports.push(report);

            // Pace after every window, failed or not. Cancellation cuts the
            // wait short; the check at the top of the loop then stops the job.
            tokio::select! {
                _ = self.pacer.wait() => {}
                _ = self.cancel.cancelled() => {}
            }
        }

        // ── Completed | Failed ───────────────────────────────────────────
        let text = aggregator.finalize();
        if text.is_empty() {
            return Err(PipelineError::NoDataExtracted {
                windows: window_count,
                failures: failures(&reports),
            });
        }

        write_output(&job.output, &text).await?;

        let succeeded = reports.iter().filter(|r| r.succeeded()).count();
        let stats = JobStats {
            total_pages: job.total_pages,
            window_size: job.window_size,
            windows: window_count,
            succeeded_windows: succeeded,
            failed_windows: window_count - succeeded,
            chunks: aggregator.chunk_count(),
            output_chars: text.chars().count(),
            total_duration_ms: started.elapsed().as_millis() as u64,
            api_duration_ms: api_time.as_millis() as u64,
        };

        Ok(JobReport {
            input: job.input,
            output: job.output,
            text,
            windows: reports,
            stats,
        })
    }
}

fn window_report(
    window: Window,
    chunk_count: usize,
    payload_bytes: usize,
    elapsed: Duration,
    error: Option<WindowError>,
) -> WindowReport {
    WindowReport {
        window,
        chunk_count,
        payload_bytes,
        duration_ms: elapsed.as_millis() as u64,
        error,
    }
}

fn failures(reports: &[WindowReport]) -> Vec<(Window, WindowError)> {
    reports
        .iter()
        .filter_map(|r| r.error.clone().map(|e| (r.window, e)))
        .collect()
}

/// Open `input` only to count pages and plan windows; no service call.
pub async fn plan(
    reader: &dyn DocumentReader,
    input: &Path,
    config: &ExtractionConfig,
) -> Result<Partitioner, PipelineError> {
    let source = reader.open(input).await?;
    Ok(Partitioner::new(source.page_count(), config.window_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobState::Initializing.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }
}
