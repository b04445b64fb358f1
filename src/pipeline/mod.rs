//! Pipeline stages for PDF-to-long-image conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the rendering engine can be swapped without
//! touching the stitcher.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──────────▶ stitch
//! (path)    (backend, N workers) (1 thread, chunk by chunk)
//!                │                   │
//!           scratch/page_NNNNN.png ──┘ deleted after use
//! ```
//!
//! 1. [`input`]: validate the document path and expand input lists
//! 2. [`backend`]: the [`backend::RasterBackend`] seam; pdfium in production
//! 3. [`render`]: fork/join rasterisation into scratch PNGs, sorted by page
//! 4. [`stitch`]: bounded-memory vertical composition and encoding

pub mod backend;
pub mod input;
pub mod render;
pub mod stitch;
