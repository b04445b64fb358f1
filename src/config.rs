//! Configuration types for PDF-to-long-image conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct is shared by every document
//! of a batch, so two runs with equal configs produce equal files.

use crate::error::Pdf2LongError;
use crate::pipeline::backend::RasterBackend;
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default JPEG quality, matching what most viewers treat as visually lossless.
pub const DEFAULT_QUALITY: u8 = 95;

/// Configuration for a PDF-to-long-image conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2long::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .scale_factor(3.0)
///     .pages_per_output(20)
///     .output_format(OutputFormat::Png)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Linear magnification applied to each page's native size. Must be > 0. Default: 2.0.
    ///
    /// A US-letter page is 612 × 792 points; at 2.0 it renders to
    /// 1224 × 1584 px. Values between 1 and 5 are typical; any positive
    /// finite value is accepted.
    pub scale_factor: f32,

    /// Number of consecutive pages stacked into one output image. ≥ 1. Default: 10.
    ///
    /// Output images are limited to 65 500 px in height. At scale 2 a letter
    /// page is ~1 600 px tall, so ~40 pages fit; lower this for larger scales.
    pub pages_per_output: usize,

    /// Encoding of the output images. Default: [`OutputFormat::Jpeg`].
    pub output_format: OutputFormat,

    /// JPEG quality, 1–100. Ignored for [`OutputFormat::Png`]. Default: 95.
    pub quality: u8,

    /// Number of rendering workers per document. Default: available CPU cores.
    ///
    /// Capped at the page count at run time.
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pre-constructed rendering backend. If None, pdfium is bound from the
    /// environment (see [`crate::pipeline::backend::PdfiumBackend::from_env`]).
    pub backend: Option<Arc<dyn RasterBackend>>,

    /// Observer receiving page progress, batch progress and log lines.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scale_factor: 2.0,
            pages_per_output: 10,
            output_format: OutputFormat::default(),
            quality: DEFAULT_QUALITY,
            concurrency: default_concurrency(),
            password: None,
            backend: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("scale_factor", &self.scale_factor)
            .field("pages_per_output", &self.pages_per_output)
            .field("output_format", &self.output_format)
            .field("quality", &self.quality)
            .field("concurrency", &self.concurrency)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn RasterBackend>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Number of CPU cores, or 1 when the platform cannot tell.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    /// Not clamped: non-positive values are rejected by [`Self::build`].
    pub fn scale_factor(mut self, scale: f32) -> Self {
        self.config.scale_factor = scale;
        self
    }

    pub fn pages_per_output(mut self, n: usize) -> Self {
        self.config.pages_per_output = n.max(1);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.clamp(1, 100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn RasterBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ConversionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2LongError> {
        let c = &self.config;
        if !c.scale_factor.is_finite() || c.scale_factor <= 0.0 {
            return Err(Pdf2LongError::InvalidConfig(format!(
                "Scale factor must be a positive number, got {}",
                c.scale_factor
            )));
        }
        if c.pages_per_output == 0 {
            return Err(Pdf2LongError::InvalidConfig(
                "Pages per output image must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Pdf2LongError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Encoding used for the stitched output images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Lossy JPEG; honours [`ConversionConfig::quality`]. (default)
    #[default]
    Jpeg,
    /// Lossless PNG; quality is ignored.
    Png,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.scale_factor, 2.0);
        assert_eq!(c.pages_per_output, 10);
        assert_eq!(c.output_format, OutputFormat::Jpeg);
        assert_eq!(c.quality, 95);
        assert!(c.concurrency >= 1);
    }

    #[test]
    fn builder_clamps_counts_and_quality() {
        let c = ConversionConfig::builder()
            .pages_per_output(0)
            .concurrency(0)
            .quality(0)
            .build()
            .unwrap();
        assert_eq!(c.pages_per_output, 1);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.quality, 1);

        let c = ConversionConfig::builder().quality(250).build().unwrap();
        assert_eq!(c.quality, 100);
    }

    #[test]
    fn builder_rejects_non_positive_scale() {
        for bad in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = ConversionConfig::builder().scale_factor(bad).build();
            assert!(
                matches!(err, Err(Pdf2LongError::InvalidConfig(_))),
                "scale {bad} should be rejected"
            );
        }
        assert!(ConversionConfig::builder().scale_factor(0.25).build().is_ok());
    }

    #[test]
    fn output_format_extensions() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert!(OutputFormat::Jpeg.is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
    }

    #[test]
    fn debug_redacts_password() {
        let c = ConversionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
