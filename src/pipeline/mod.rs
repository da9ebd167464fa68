//! Pipeline stages for windowed Document AI extraction.
//!
//! Each submodule implements one step; the orchestrator wires them together
//! and is the only stateful piece.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ partition ──▶ docai ──▶ pacing ──▶ aggregate ──▶ output
//! (path)   (pdfium)   (windows)    (HTTP)    (delay)    (merge)       (file)
//! ```
//!
//! 1. [`input`]: validate the source path, derive the default output path
//! 2. [`split`]: count pages and build one sub-document per window
//! 3. [`partition`]: plan contiguous windows of at most `window_size` pages
//! 4. [`docai`]: submit a window to the Layout Parser; the only stage
//!    with network I/O
//! 5. [`pacing`]: wait between calls to stay under the service quota
//! 6. [`aggregate`]: join chunks from successful windows in page order
//! 7. [`orchestrator`]: the per-job state machine driving all of the above

pub mod aggregate;
pub mod docai;
pub mod input;
pub mod orchestrator;
pub mod pacing;
pub mod partition;
pub mod split;
