//! # edgequake-pdf2long
//!
//! Convert PDF documents into vertically stitched "long images": every page
//! rendered to a raster, then stacked top to bottom into one or more JPEG or
//! PNG files.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input   validate path and %PDF header
//!  ├─ 2. Render  rasterise pages via pdfium on N blocking workers
//!  │             → scratch/page_00000.png … sorted by page index
//!  ├─ 3. Stitch  chunk pages, guard the 65 500 px limit, compose, encode
//!  └─ 4. Output  <name>.jpg  or  <name>_part1.jpg, <name>_part2.jpg, …
//! ```
//!
//! Documents in a batch are processed one at a time; only the pages of a
//! single document are rendered in parallel. A broken page or an oversized
//! chunk is logged and skipped without failing the document, and a failed
//! document never stops the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2long::{convert_batch, ConversionConfig, OutputFormat};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .scale_factor(2.0)
//!         .pages_per_output(10)
//!         .output_format(OutputFormat::Jpeg)
//!         .quality(90)
//!         .build()?;
//!     let inputs = vec![PathBuf::from("slides.pdf"), PathBuf::from("report.pdf")];
//!     let summary = convert_batch(&inputs, "long_images", &config).await?;
//!     eprintln!("{} ok, {} failed", summary.succeeded(), summary.failed());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2long` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## PDFium
//!
//! Rendering uses the pdfium library through `pdfium-render`. Point
//! `PDFIUM_LIB_PATH` at the library (or its directory) if it is not next to
//! the binary or on the system loader path, or inject your own
//! [`RasterBackend`] with [`ConversionConfigBuilder::backend`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OutputFormat, DEFAULT_QUALITY};
pub use convert::{convert_batch, convert_batch_sync, convert_document, inspect};
pub use error::{ChunkError, ChunkStage, DocumentOpenError, PageError, Pdf2LongError};
pub use output::{
    BatchSummary, DocumentInfo, DocumentReport, OutputImage, RenderedPage, StitchReport,
};
pub use pipeline::backend::{PageSink, PdfiumBackend, RasterBackend};
pub use pipeline::stitch::MAX_IMAGE_DIMENSION;
pub use progress::{
    ConversionProgressCallback, LogLevel, NoopProgressCallback, ProgressAccumulator,
    ProgressCallback,
};
