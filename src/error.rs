//! Error types for the edgequake-pdf2long library.
//!
//! Failures are contained at the smallest granularity that makes sense:
//!
//! * [`Pdf2LongError`]: **Fatal** for one document (or, for configuration
//!   and output-folder problems, for the whole batch). A document that fails
//!   this way is listed in [`crate::output::BatchSummary::failed_documents`].
//!
//! * [`PageError`]: **Non-fatal**: a single page could not be rasterised or
//!   written to scratch space. The page is omitted and the remaining pages
//!   are still stitched.
//!
//! * [`ChunkError`]: **Non-fatal**: one output image (a chunk of
//!   consecutive pages) could not be produced. Later chunks still run and
//!   the chunk's scratch files are still removed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the edgequake-pdf2long library.
#[derive(Debug, Error)]
pub enum Pdf2LongError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The source document could not be opened.
    #[error(transparent)]
    DocumentOpen(#[from] DocumentOpenError),

    /// The document has pages but not a single one rendered.
    #[error("No page of '{path}' could be rendered ({total} pages attempted)")]
    NoPagesRendered { path: PathBuf, total: usize },

    /// Pages rendered, but every output image was skipped.
    #[error("No image was written for '{path}' ({skipped} skipped)")]
    NoImagesProduced { path: PathBuf, skipped: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The output folder does not exist and could not be created.
    #[error("Cannot use output folder '{path}': {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scratch directory for intermediate page images could not be created.
    #[error("Failed to create scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or to the directory containing it),\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a source document could not be opened.
#[derive(Debug, Clone, Error)]
pub enum DocumentOpenError {
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The rendering engine itself was unavailable when the document was opened.
    #[error("Rendering engine unavailable for '{path}': {detail}")]
    EngineUnavailable { path: PathBuf, detail: String },
}

/// A non-fatal error for a single page.
///
/// Page numbers in messages are 1-indexed; `index` fields are 0-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {}: rasterisation failed: {detail}", .index + 1)]
    RenderFailed { index: usize, detail: String },

    /// The rendered page could not be written to scratch space.
    #[error("Page {}: could not save '{path}': {detail}", .index + 1)]
    SaveFailed {
        index: usize,
        path: PathBuf,
        detail: String,
    },
}

impl PageError {
    /// Zero-based index of the page this error belongs to.
    pub fn index(&self) -> usize {
        match self {
            PageError::RenderFailed { index, .. } | PageError::SaveFailed { index, .. } => *index,
        }
    }
}

/// A non-fatal error for one output image.
///
/// `part` is the 1-indexed chunk number, matching the `_part<N>` file suffix.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ChunkError {
    /// The stacked height exceeds what common image codecs support.
    #[error(
        "Part {part}: stacked height {height}px exceeds the {limit}px image limit; \
         lower the number of pages per image"
    )]
    DimensionExceeded { part: usize, height: u64, limit: u32 },

    /// Reading a page, composing the canvas, or encoding the output failed.
    #[error("Part {part}: {stage} failed: {detail}")]
    Image {
        part: usize,
        stage: ChunkStage,
        detail: String,
    },
}

impl ChunkError {
    /// 1-indexed chunk number.
    pub fn part(&self) -> usize {
        match self {
            ChunkError::DimensionExceeded { part, .. } | ChunkError::Image { part, .. } => *part,
        }
    }
}

/// Which step of chunk production failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStage {
    Scan,
    Compose,
    Encode,
}

impl std::fmt::Display for ChunkStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChunkStage::Scan => "dimension scan",
            ChunkStage::Compose => "composition",
            ChunkStage::Encode => "encoding",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_error_display_is_one_indexed() {
        let e = PageError::RenderFailed {
            index: 6,
            detail: "bad stream".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("Page 7"), "got: {msg}");
        assert_eq!(e.index(), 6);
    }

    #[test]
    fn dimension_error_names_part_and_advice() {
        let e = ChunkError::DimensionExceeded {
            part: 2,
            height: 70_000,
            limit: 65_500,
        };
        let msg = e.to_string();
        assert!(msg.contains("Part 2"), "got: {msg}");
        assert!(msg.contains("70000px"), "got: {msg}");
        assert!(msg.contains("pages per image"), "got: {msg}");
        assert_eq!(e.part(), 2);
    }

    #[test]
    fn chunk_stage_display() {
        let e = ChunkError::Image {
            part: 1,
            stage: ChunkStage::Encode,
            detail: "disk full".into(),
        };
        assert_eq!(e.to_string(), "Part 1: encoding failed: disk full");
    }

    #[test]
    fn document_open_error_is_transparent() {
        let e: Pdf2LongError = DocumentOpenError::PasswordRequired {
            path: "secret.pdf".into(),
        }
        .into();
        assert!(e.to_string().contains("secret.pdf"));
        assert!(e.to_string().contains("--password"));
    }

    #[test]
    fn no_pages_rendered_display() {
        let e = Pdf2LongError::NoPagesRendered {
            path: "broken.pdf".into(),
            total: 4,
        };
        assert!(e.to_string().contains("4 pages attempted"));
    }
}
