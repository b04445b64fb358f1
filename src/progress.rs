//! Progress and log observer for batch conversion.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while documents are rendered and stitched. The library knows
//! nothing about the presentation layer: a GUI, the bundled CLI progress bar
//! and the test harness all implement the same trait.
//!
//! Two granularities are reported:
//!
//! * [`ConversionProgressCallback::on_page_progress`]: `(completed, total)`
//!   pages of the current document during rendering.
//! * [`ConversionProgressCallback::on_batch_progress`]: a coarse
//!   `(percent, status)` pair across the whole batch, computed by
//!   [`ProgressAccumulator`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2long::{ConversionConfig, ConversionProgressCallback, LogLevel};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_log(&self, level: LogLevel, message: &str) {
//!         eprintln!("[{level}] {message}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchSummary, DocumentReport};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Severity of a log line forwarded to [`ConversionProgressCallback::on_log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Called by the conversion pipeline as it processes a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Rendering workers never call the observer directly: page events are
/// funnelled to the task driving the batch, and stitching logs come from a
/// single blocking task that the batch awaits. Calls for one batch therefore
/// never overlap, but they may arrive on different threads, hence
/// `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called before a document is opened.
    ///
    /// # Arguments
    /// * `doc_num`: 1-indexed position in the batch
    /// * `total_docs`: number of documents in the batch
    /// * `path`: the source PDF
    fn on_document_start(&self, doc_num: usize, total_docs: usize, path: &Path) {
        let _ = (doc_num, total_docs, path);
    }

    /// Called once per settled page while a document renders.
    ///
    /// `completed` grows by exactly one per call, from 1 to `total`. A
    /// zero-page document produces a single `(0, 0)` call.
    fn on_page_progress(&self, completed: usize, total: usize) {
        let _ = (completed, total);
    }

    /// A human-readable progress, warning or error line.
    fn on_log(&self, level: LogLevel, message: &str) {
        let _ = (level, message);
    }

    /// Coarse batch progress, 0–100, with a short status text.
    fn on_batch_progress(&self, percent: u8, status: &str) {
        let _ = (percent, status);
    }

    /// Called after a document has been rendered and stitched (or failed).
    fn on_document_complete(&self, report: &DocumentReport) {
        let _ = report;
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Log a line through `tracing` and forward it to the observer.
pub(crate) fn emit(cb: &dyn ConversionProgressCallback, level: LogLevel, message: &str) {
    match level {
        LogLevel::Info => tracing::info!("{}", message),
        LogLevel::Warn => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
    }
    cb.on_log(level, message);
}

/// Share of a document's progress span given to rendering; stitching gets the rest.
pub const RENDER_WEIGHT: f64 = 0.9;

/// Caller-held batch progress state.
///
/// Each document owns an equal span of the 0–100 range. Within its span,
/// rendering fills the first 90 % page by page and stitching the last 10 %.
#[derive(Debug, Clone)]
pub struct ProgressAccumulator {
    total_docs: usize,
    doc_index: usize,
}

impl ProgressAccumulator {
    pub fn new(total_docs: usize) -> Self {
        Self {
            total_docs,
            doc_index: 0,
        }
    }

    /// Move to the 0-indexed document `doc_index`.
    pub fn begin_document(&mut self, doc_index: usize) {
        self.doc_index = doc_index;
    }

    fn span(&self) -> f64 {
        100.0 / self.total_docs.max(1) as f64
    }

    fn base(&self) -> f64 {
        self.doc_index as f64 * self.span()
    }

    /// Percent reached after `completed` of `total` pages rendered.
    pub fn render_percent(&self, completed: usize, total: usize) -> u8 {
        let fraction = if total == 0 {
            1.0
        } else {
            completed.min(total) as f64 / total as f64
        };
        to_percent(self.base() + self.span() * RENDER_WEIGHT * fraction)
    }

    /// Percent reached when stitching of the current document starts.
    pub fn stitch_percent(&self) -> u8 {
        to_percent(self.base() + self.span() * RENDER_WEIGHT)
    }

    /// Percent reached when the current document is finished.
    pub fn document_done_percent(&self) -> u8 {
        to_percent(self.base() + self.span())
    }
}

fn to_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
