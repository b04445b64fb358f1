//! Stitching: stack rendered pages vertically into long output images.
//!
//! Pages are split into consecutive chunks of `pages_per_output`. Each chunk
//! becomes one image, built in three passes so that at most one decoded page
//! sits in memory next to the canvas:
//!
//! 1. **Scan**: read only the PNG headers to learn the canvas size.
//! 2. **Compose**: decode pages one at a time, paste left-aligned, drop.
//! 3. **Encode**: JPEG (with quality) or PNG, written to a `.tmp` sibling
//!    and renamed into place so a failed encode never leaves a partial file.
//!
//! Common codecs cap image dimensions at 65 535 px; chunks taller than
//! [`MAX_IMAGE_DIMENSION`] are skipped with a warning instead of failing
//! deep inside the encoder. Whatever happens to a chunk, its scratch page
//! files are deleted afterwards.

use crate::config::OutputFormat;
use crate::error::{ChunkError, ChunkStage, Pdf2LongError};
use crate::output::{OutputImage, RenderedPage, StitchReport};
use crate::progress::{emit, ConversionProgressCallback, LogLevel, ProgressCallback};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{imageops, Rgb, RgbImage};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tallest composite the stitcher will attempt, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 65_500;

/// Canvas fill visible where a page is narrower than the widest page of its chunk.
const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Output settings for one document.
#[derive(Debug, Clone)]
pub struct StitchJob {
    /// Output folder joined with the source file stem, without extension.
    pub output_base: PathBuf,
    pub pages_per_output: usize,
    pub format: OutputFormat,
    /// Only used for [`OutputFormat::Jpeg`].
    pub quality: u8,
}

/// Run [`stitch_pages`] on the blocking pool.
pub async fn stitch_document(
    pages: Vec<RenderedPage>,
    job: StitchJob,
    observer: ProgressCallback,
) -> Result<StitchReport, Pdf2LongError> {
    tokio::task::spawn_blocking(move || stitch_pages(&pages, &job, observer.as_ref()))
        .await
        .map_err(|e| Pdf2LongError::Internal(format!("Stitch task panicked: {}", e)))
}

/// Stitch `pages` (already in page order) chunk by chunk.
///
/// Never fails as a whole: every chunk problem is logged, recorded in the
/// returned report, and the next chunk is attempted.
pub fn stitch_pages(
    pages: &[RenderedPage],
    job: &StitchJob,
    observer: &dyn ConversionProgressCallback,
) -> StitchReport {
    let mut report = StitchReport::default();
    if pages.is_empty() {
        return report;
    }

    let per_output = job.pages_per_output.max(1);
    let total_parts = chunk_count(pages.len(), per_output);
    let label = job
        .output_base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for (i, chunk) in pages.chunks(per_output).enumerate() {
        let part = i + 1;
        let target = output_path(&job.output_base, part, total_parts, job.format);

        let result = produce_chunk(chunk, part, &target, job);
        remove_scratch(chunk, observer);

        match result {
            Ok(image) => {
                emit(
                    observer,
                    LogLevel::Info,
                    &format!(
                        "Created {} ({}x{} px, {} pages)",
                        target.display(),
                        image.width,
                        image.height,
                        image.pages.len()
                    ),
                );
                report.outputs.push(image);
            }
            Err(e) => {
                let level = match e {
                    ChunkError::DimensionExceeded { .. } => LogLevel::Warn,
                    ChunkError::Image { .. } => LogLevel::Error,
                };
                emit(observer, level, &format!("{}: {}", label, e));
                report.skipped_chunks.push(e);
            }
        }
    }

    report
}

/// Number of output images for `pages` pages, `per_output` per image.
pub fn chunk_count(pages: usize, per_output: usize) -> usize {
    pages.div_ceil(per_output.max(1))
}

/// `<base>.<ext>` for a single chunk, `<base>_part<N>.<ext>` otherwise.
///
/// Built on the file name rather than `with_extension` so stems containing
/// dots (`report.v2`) survive intact.
pub fn output_path(base: &Path, part: usize, total_parts: usize, format: OutputFormat) -> PathBuf {
    let mut name: OsString = base.file_name().map(OsString::from).unwrap_or_default();
    if total_parts > 1 {
        name.push(format!("_part{}", part));
    }
    name.push(".");
    name.push(format.extension());
    base.with_file_name(name)
}

fn produce_chunk(
    chunk: &[RenderedPage],
    part: usize,
    target: &Path,
    job: &StitchJob,
) -> Result<OutputImage, ChunkError> {
    // ── Scan ─────────────────────────────────────────────────────────────
    let mut total_height: u64 = 0;
    let mut canvas_width: u32 = 0;
    for page in chunk {
        let (w, h) = image::image_dimensions(&page.path)
            .map_err(|e| image_error(part, ChunkStage::Scan, &page.path, e))?;
        total_height += u64::from(h);
        canvas_width = canvas_width.max(w);
    }

    if total_height > u64::from(MAX_IMAGE_DIMENSION) {
        return Err(ChunkError::DimensionExceeded {
            part,
            height: total_height,
            limit: MAX_IMAGE_DIMENSION,
        });
    }
    let canvas_height = total_height as u32;
    debug!(
        "Part {}: canvas {}x{} px from {} pages",
        part,
        canvas_width,
        canvas_height,
        chunk.len()
    );

    // ── Compose ──────────────────────────────────────────────────────────
    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, BACKGROUND);
    let mut y_offset: u32 = 0;
    for page in chunk {
        let img = image::open(&page.path)
            .map_err(|e| image_error(part, ChunkStage::Compose, &page.path, e))?
            .into_rgb8();
        imageops::replace(&mut canvas, &img, 0, i64::from(y_offset));
        y_offset += img.height();
    }

    // ── Encode ───────────────────────────────────────────────────────────
    write_atomically(&canvas, target, job.format, job.quality).map_err(|detail| {
        ChunkError::Image {
            part,
            stage: ChunkStage::Encode,
            detail: format!("{}: {}", target.display(), detail),
        }
    })?;

    Ok(OutputImage {
        part,
        path: target.to_path_buf(),
        width: canvas_width,
        height: canvas_height,
        pages: chunk.iter().map(|p| p.index).collect(),
    })
}

fn image_error(part: usize, stage: ChunkStage, path: &Path, e: image::ImageError) -> ChunkError {
    ChunkError::Image {
        part,
        stage,
        detail: format!("{}: {}", path.display(), e),
    }
}

/// Encode to `<target>.tmp`, then rename over `target`.
fn write_atomically(
    canvas: &RgbImage,
    target: &Path,
    format: OutputFormat,
    quality: u8,
) -> Result<(), String> {
    let mut tmp_name: OsString = target.file_name().map(OsString::from).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = target.with_file_name(tmp_name);

    let result = encode_to(canvas, &tmp_path, format, quality)
        .and_then(|()| fs::rename(&tmp_path, target).map_err(|e| e.to_string()));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn encode_to(
    canvas: &RgbImage,
    path: &Path,
    format: OutputFormat,
    quality: u8,
) -> Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Jpeg => {
            canvas.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
        }
        OutputFormat::Png => canvas.write_with_encoder(PngEncoder::new(&mut writer)),
    }
    .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

/// Delete a chunk's scratch pages. Failures are logged and otherwise ignored.
fn remove_scratch(chunk: &[RenderedPage], observer: &dyn ConversionProgressCallback) {
    for page in chunk {
        match fs::remove_file(&page.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => emit(
                observer,
                LogLevel::Warn,
                &format!(
                    "Could not delete temporary file '{}': {}",
                    page.path.display(),
                    e
                ),
            ),
        }
    }
}
