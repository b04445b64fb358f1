//! Batch orchestration: render then stitch, one document at a time.
//!
//! Parallelism lives only inside a document's page rendering. Documents are
//! processed strictly in sequence, and each is rendered completely before
//! its first output image is stitched, so peak memory is one canvas plus
//! one decoded page regardless of batch size.
//!
//! A failing document never aborts the batch: its error is logged, recorded
//! in its [`DocumentReport`], and the next document starts.

use crate::config::ConversionConfig;
use crate::error::Pdf2LongError;
use crate::output::{BatchSummary, DocumentInfo, DocumentReport};
use crate::pipeline::backend::{PdfiumBackend, RasterBackend};
use crate::pipeline::input;
use crate::pipeline::render::{render_document, RenderJob};
use crate::pipeline::stitch::{stitch_document, StitchJob};
use crate::progress::{
    emit, ConversionProgressCallback, LogLevel, NoopProgressCallback, ProgressAccumulator,
    ProgressCallback,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info};

/// Convert every document in `inputs` into long images under `output_dir`.
///
/// Documents that share a file stem are written as `<stem>`, `<stem>_2`, ...
/// in input order, so no document overwrites another's images.
///
/// # Returns
/// `Ok(BatchSummary)` once every document has been attempted, even if some
/// failed (see [`BatchSummary::failed_documents`]).
///
/// # Errors
/// Only problems that prevent the whole batch from starting:
/// - the output folder cannot be created
/// - the scratch directory cannot be created
/// - no rendering backend is available
pub async fn convert_batch(
    inputs: &[PathBuf],
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchSummary, Pdf2LongError> {
    let total_start = Instant::now();
    let output_dir = output_dir.as_ref();
    info!(
        "Starting batch: {} documents → {}",
        inputs.len(),
        output_dir.display()
    );

    prepare_output_dir(output_dir).await?;
    let backend = resolve_backend(config)?;
    let observer = resolve_observer(config);
    let scratch = new_scratch_dir()?;

    let ctx = DocumentContext {
        backend: &backend,
        observer: &observer,
        config,
    };

    let output_bases = input::unique_output_bases(output_dir, inputs);
    let mut acc = ProgressAccumulator::new(inputs.len());
    let mut summary = BatchSummary::default();

    for (i, (input, output_base)) in inputs.iter().zip(&output_bases).enumerate() {
        acc.begin_document(i);
        observer.on_document_start(i + 1, inputs.len(), input);

        if *output_base != input::output_base(output_dir, input) {
            emit(
                observer.as_ref(),
                LogLevel::Warn,
                &format!(
                    "Another document is already named like '{}'; writing its images as '{}'",
                    input.display(),
                    output_base.display()
                ),
            );
        }

        let doc_scratch = scratch.path().join(format!("{:04}", i));
        let mut report = DocumentReport::new(input);
        if let Err(e) = ctx
            .run(input, output_base, &doc_scratch, &acc, &mut report)
            .await
        {
            emit(
                observer.as_ref(),
                LogLevel::Error,
                &format!("Failed to convert {}: {}", report.display_name(), e),
            );
            report.error = Some(e.to_string());
        }
        remove_dir_quietly(&doc_scratch).await;

        observer.on_batch_progress(
            acc.document_done_percent(),
            &format!("Finished {} ({}/{})", report.display_name(), i + 1, inputs.len()),
        );
        observer.on_document_complete(&report);
        summary.documents.push(report);
    }

    let scratch_path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => emit(observer.as_ref(), LogLevel::Info, "Temporary files cleaned up."),
        Err(e) => emit(
            observer.as_ref(),
            LogLevel::Warn,
            &format!(
                "Could not remove temporary folder '{}': {}",
                scratch_path.display(),
                e
            ),
        ),
    }

    summary.total_duration_ms = total_start.elapsed().as_millis() as u64;
    emit(
        observer.as_ref(),
        LogLevel::Info,
        &format!(
            "Batch complete: {} succeeded, {} failed, {}ms",
            summary.succeeded(),
            summary.failed(),
            summary.total_duration_ms
        ),
    );
    observer.on_batch_complete(&summary);

    Ok(summary)
}

/// Convert a single document into long images under `output_dir`.
///
/// Unlike [`convert_batch`], a document-level failure is returned as `Err`.
/// Chunk-level problems are still reported in
/// [`DocumentReport::skipped_chunks`] of an `Ok` result.
pub async fn convert_document(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentReport, Pdf2LongError> {
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    prepare_output_dir(output_dir).await?;
    let backend = resolve_backend(config)?;
    let observer = resolve_observer(config);
    let scratch = new_scratch_dir()?;

    let ctx = DocumentContext {
        backend: &backend,
        observer: &observer,
        config,
    };
    let acc = ProgressAccumulator::new(1);
    let mut report = DocumentReport::new(input);
    observer.on_document_start(1, 1, input);

    let output_base = input::output_base(output_dir, input);
    ctx.run(input, &output_base, scratch.path(), &acc, &mut report).await?;

    observer.on_batch_progress(acc.document_done_percent(), "Done");
    observer.on_document_complete(&report);
    Ok(report)
}

/// Synchronous wrapper around [`convert_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_batch_sync(
    inputs: &[PathBuf],
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchSummary, Pdf2LongError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2LongError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_batch(inputs, output_dir, config))
}

/// Read a document's page count without rendering anything.
pub async fn inspect(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentInfo, Pdf2LongError> {
    let path = input.as_ref().to_path_buf();
    input::validate_document(&path)?;
    let backend = resolve_backend(config)?;
    let password = config.password.clone();

    let file_size_bytes = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
    let page_count = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || backend.page_count(&path, password.as_deref()))
            .await
            .map_err(|e| Pdf2LongError::Internal(format!("Inspect task panicked: {}", e)))??
    };

    Ok(DocumentInfo {
        path,
        page_count,
        file_size_bytes,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Shared, read-only state for converting the documents of one batch.
struct DocumentContext<'a> {
    backend: &'a Arc<dyn RasterBackend>,
    observer: &'a ProgressCallback,
    config: &'a ConversionConfig,
}

impl DocumentContext<'_> {
    /// Render and stitch one document, filling `report` as it goes.
    ///
    /// Images are written as `<output_base>[_partN].<ext>`. `Err` means the
    /// document counts as failed.
    async fn run(
        &self,
        input: &Path,
        output_base: &Path,
        scratch_dir: &Path,
        acc: &ProgressAccumulator,
        report: &mut DocumentReport,
    ) -> Result<(), Pdf2LongError> {
        let observer: &dyn ConversionProgressCallback = self.observer.as_ref();
        let name = report.display_name();
        emit(observer, LogLevel::Info, &format!("Processing {}", name));

        input::validate_document(input)?;
        tokio::fs::create_dir_all(scratch_dir)
            .await
            .map_err(Pdf2LongError::ScratchDir)?;

        // ── Render ───────────────────────────────────────────────────────
        let render_start = Instant::now();
        let job = RenderJob {
            pdf_path: input,
            scratch_dir,
            scale: self.config.scale_factor,
            password: self.config.password.as_deref(),
            workers: self.config.concurrency,
        };
        let mut on_progress = |completed: usize, total: usize| {
            observer.on_page_progress(completed, total);
            observer.on_batch_progress(
                acc.render_percent(completed, total),
                &format!("Rendering {}: page {}/{}", name, completed, total),
            );
        };
        let outcome =
            render_document(Arc::clone(self.backend), &job, observer, &mut on_progress).await?;

        report.total_pages = outcome.total_pages;
        report.rendered_pages = outcome.pages.len();
        report.page_errors = outcome.errors;
        report.render_duration_ms = render_start.elapsed().as_millis() as u64;

        if outcome.total_pages == 0 {
            emit(
                observer,
                LogLevel::Warn,
                &format!("{} has no pages; nothing to stitch", name),
            );
            return Ok(());
        }
        if outcome.pages.is_empty() {
            return Err(Pdf2LongError::NoPagesRendered {
                path: input.to_path_buf(),
                total: outcome.total_pages,
            });
        }
        emit(
            observer,
            LogLevel::Info,
            &format!(
                "Rendered {}/{} pages of {} in {}ms",
                report.rendered_pages, report.total_pages, name, report.render_duration_ms
            ),
        );

        // ── Stitch ───────────────────────────────────────────────────────
        observer.on_batch_progress(acc.stitch_percent(), &format!("Stitching {}", name));
        let stitch_start = Instant::now();
        let stitch_job = StitchJob {
            output_base: output_base.to_path_buf(),
            pages_per_output: self.config.pages_per_output,
            format: self.config.output_format,
            quality: self.config.quality,
        };
        let stitched =
            stitch_document(outcome.pages, stitch_job, Arc::clone(self.observer)).await?;

        report.outputs = stitched.outputs;
        report.skipped_chunks = stitched.skipped_chunks;
        report.stitch_duration_ms = stitch_start.elapsed().as_millis() as u64;
        debug!(
            "{}: {} images written, {} chunks skipped",
            name,
            report.outputs.len(),
            report.skipped_chunks.len()
        );

        if report.outputs.is_empty() {
            return Err(Pdf2LongError::NoImagesProduced {
                path: input.to_path_buf(),
                skipped: report.skipped_chunks.len(),
            });
        }
        Ok(())
    }
}

/// Pre-built backend first, otherwise bind pdfium from the environment.
fn resolve_backend(config: &ConversionConfig) -> Result<Arc<dyn RasterBackend>, Pdf2LongError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    Ok(Arc::new(PdfiumBackend::from_env()?))
}

fn resolve_observer(config: &ConversionConfig) -> ProgressCallback {
    config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback))
}

async fn prepare_output_dir(output_dir: &Path) -> Result<(), Pdf2LongError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Pdf2LongError::OutputDirUnavailable {
            path: output_dir.to_path_buf(),
            source: e,
        })
}

fn new_scratch_dir() -> Result<TempDir, Pdf2LongError> {
    tempfile::Builder::new()
        .prefix("pdf2long_")
        .tempdir()
        .map_err(Pdf2LongError::ScratchDir)
}

/// Best-effort removal of a document's scratch folder.
async fn remove_dir_quietly(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Could not remove '{}': {}", dir.display(), e);
        }
    }
}
