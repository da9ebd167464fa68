//! Observer trait for window- and job-level pipeline events.
//!
//! The orchestrator never logs decisions inline; it reports them to a
//! [`PipelineObserver`] at fixed points (job start, window start, window
//! outcome, job outcome). [`TracingObserver`] turns those events into
//! `tracing` records and is used when no other observer is configured. The
//! CLI installs a progress-bar observer instead.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docai::{ExtractionConfig, PipelineObserver, Window};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use std::time::Duration;
//!
//! struct CountingObserver {
//!     done: AtomicUsize,
//! }
//!
//! impl PipelineObserver for CountingObserver {
//!     fn on_window_complete(&self, window: Window, chunks: usize, _elapsed: Duration) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("pages {} → {} chunks", window.page_label(), chunks);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingObserver { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{PipelineError, WindowError};
use crate::output::JobReport;
use crate::pipeline::partition::Window;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Called by the pipeline as it processes each window.
///
/// All methods default to no-ops so implementors only override what they
/// need. Windows are processed one at a time, so calls never overlap.
pub trait PipelineObserver: Send + Sync {
    /// Called once after the source is opened and the windows are planned.
    fn on_job_start(&self, total_pages: usize, window_count: usize) {
        let _ = (total_pages, window_count);
    }

    /// Called just before the window's sub-document is built and submitted.
    ///
    /// `index` is 0-based; `count` is the total number of windows.
    fn on_window_start(&self, window: Window, index: usize, count: usize) {
        let _ = (window, index, count);
    }

    /// Called when Document AI returned chunks for the window.
    fn on_window_complete(&self, window: Window, chunk_count: usize, elapsed: Duration) {
        let _ = (window, chunk_count, elapsed);
    }

    /// Called when the window failed and is being skipped.
    fn on_window_error(&self, window: Window, error: &WindowError, elapsed: Duration) {
        let _ = (window, error, elapsed);
    }

    /// Called once after the output file was written.
    fn on_job_complete(&self, report: &JobReport) {
        let _ = report;
    }

    /// Called once when the job ends without output.
    fn on_job_failed(&self, error: &PipelineError) {
        let _ = error;
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Default observer: one `tracing` record per event.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_job_start(&self, total_pages: usize, window_count: usize) {
        info!(
            "Starting extraction: {} pages in {} windows",
            total_pages, window_count
        );
    }

    fn on_window_start(&self, window: Window, index: usize, count: usize) {
        info!(
            "Processing pages {} (window {}/{})",
            window.page_label(),
            index + 1,
            count
        );
    }

    fn on_window_complete(&self, window: Window, chunk_count: usize, elapsed: Duration) {
        info!(
            "Pages {}: {} chunks ({})",
            window.page_label(),
            chunk_count,
            format_duration(elapsed)
        );
    }

    fn on_window_error(&self, window: Window, error: &WindowError, elapsed: Duration) {
        warn!(
            "Pages {} skipped after {}: {}",
            window.page_label(),
            format_duration(elapsed),
            error
        );
    }

    fn on_job_complete(&self, report: &JobReport) {
        info!(
            "Done: {}/{} windows, {} chunks → {} ({})",
            report.stats.succeeded_windows,
            report.stats.windows,
            report.stats.chunks,
            report.output.display(),
            format_duration(Duration::from_millis(report.stats.total_duration_ms))
        );
    }

    fn on_job_failed(&self, err: &PipelineError) {
        error!("Extraction failed: {}", err);
    }
}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn PipelineObserver>;

/// `"412.37ms"` below one second, `"3.05s"` above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.2}ms", secs * 1000.0)
    } else {
        format!("{:.2}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingObserver {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PipelineObserver for TrackingObserver {
        fn on_window_start(&self, _window: Window, _index: usize, _count: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_window_complete(&self, _window: Window, _chunks: usize, _elapsed: Duration) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_window_error(&self, _window: Window, _error: &WindowError, _elapsed: Duration) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_job_start(32, 3);
        obs.on_window_start(Window::new(0, 15), 0, 3);
        obs.on_window_complete(Window::new(0, 15), 2, Duration::from_millis(10));
        obs.on_window_error(Window::new(15, 30), &WindowError::EmptyResult, Duration::ZERO);
        obs.on_job_failed(&PipelineError::Internal("x".into()));
    }

    #[test]
    fn tracking_observer_receives_events() {
        let obs = TrackingObserver::default();
        obs.on_window_start(Window::new(0, 15), 0, 2);
        obs.on_window_complete(Window::new(0, 15), 2, Duration::ZERO);
        obs.on_window_start(Window::new(15, 20), 1, 2);
        obs.on_window_error(Window::new(15, 20), &WindowError::EmptyResult, Duration::ZERO);

        assert_eq!(obs.starts.load(Ordering::SeqCst), 2);
        assert_eq!(obs.completes.load(Ordering::SeqCst), 1);
        assert_eq!(obs.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_micros(412_370)), "412.37ms");
        assert_eq!(format_duration(Duration::from_millis(3050)), "3.05s");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.00s");
    }
}
