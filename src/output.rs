//! Result types produced by the conversion pipeline.

use crate::error::{ChunkError, PageError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One rendered page waiting in scratch space to be stitched.
///
/// Created by the renderer and consumed exactly once by the stitcher, which
/// deletes `path` afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    /// 0-indexed position in the source document; the only ordering key.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Temporary PNG holding the page raster.
    pub path: PathBuf,
}

/// Facts about a source document gathered without rendering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub page_count: usize,
    pub file_size_bytes: u64,
}

/// One stitched image written to the output folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputImage {
    /// 1-indexed chunk number.
    pub part: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// 0-indexed source pages, top to bottom.
    pub pages: Vec<usize>,
}

/// What the stitcher did with one document's pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchReport {
    pub outputs: Vec<OutputImage>,
    pub skipped_chunks: Vec<ChunkError>,
}

/// Outcome of converting one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source: PathBuf,
    /// Page count of the document, 0 if it could not be opened.
    pub total_pages: usize,
    /// Pages that rendered successfully.
    pub rendered_pages: usize,
    pub page_errors: Vec<PageError>,
    pub outputs: Vec<OutputImage>,
    pub skipped_chunks: Vec<ChunkError>,
    /// Set when the document counts as failed in the batch summary.
    pub error: Option<String>,
    pub render_duration_ms: u64,
    pub stitch_duration_ms: u64,
}

impl DocumentReport {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// File name used to identify the document in summaries.
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub documents: Vec<DocumentReport>,
    pub total_duration_ms: u64,
}

impl BatchSummary {
    /// Identifiers (file names) of documents that failed.
    pub fn failed_documents(&self) -> Vec<String> {
        self.documents
            .iter()
            .filter(|d| d.is_failed())
            .map(DocumentReport::display_name)
            .collect()
    }

    pub fn failed(&self) -> usize {
        self.documents.iter().filter(|d| d.is_failed()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.documents.len() - self.failed()
    }

    /// Every output image of the batch, in document then part order.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.documents
            .iter()
            .flat_map(|d| d.outputs.iter().map(|o| o.path.clone()))
            .collect()
    }
}
