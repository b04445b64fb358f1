//! Rendering backends: the seam between the page renderer and a PDF engine.
//!
//! The renderer only needs two things from an engine: the page count of a
//! document, and a way to rasterise a list of pages from its own document
//! handle. [`RasterBackend`] captures exactly that, so the fork/join logic in
//! [`crate::pipeline::render`] can be exercised with an in-memory backend in
//! tests and driven by [`PdfiumBackend`] in production.
//!
//! ## Thread model
//!
//! Each rendering worker calls [`RasterBackend::render_pages`] once with its
//! share of the page indices and opens its own document handle. Nothing is
//! shared between workers except `&self`.
//!
//! With `pdfium-render`'s `thread_safe` feature a process-wide lock is taken
//! when a `Pdfium` binding is created and released when it is dropped, so
//! [`PdfiumBackend::render_pages`] rasterises one worker's share at a time.
//! The sink must therefore stay cheap: it hands rasters over and returns.
//! PNG encoding and scratch writes happen on the renderer's encoder tasks,
//! outside the lock.

use crate::error::{DocumentOpenError, PageError};
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Receives each rasterised page as soon as it is ready.
pub type PageSink<'a> = dyn FnMut(usize, Result<RgbImage, PageError>) + 'a;

/// A PDF engine able to rasterise pages at a linear scale factor.
pub trait RasterBackend: Send + Sync {
    /// Open `path` and return its number of pages.
    fn page_count(&self, path: &Path, password: Option<&str>) -> Result<usize, DocumentOpenError>;

    /// Open `path` and rasterise every page in `indices`, in order.
    ///
    /// `on_page` is called exactly once per index with either the page as
    /// 8-bit RGB or the reason it failed. A failing page must not stop the
    /// remaining ones. An `Err` return means the document could not be opened
    /// at all and `on_page` was not called.
    fn render_pages(
        &self,
        path: &Path,
        password: Option<&str>,
        indices: &[usize],
        scale: f32,
        on_page: &mut PageSink<'_>,
    ) -> Result<(), DocumentOpenError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`RasterBackend`] over the pdfium library via `pdfium-render`.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    /// Library file or directory containing it; None = `./` then system loader.
    library: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Bind using `PDFIUM_LIB_PATH` when set, otherwise the working
    /// directory and then the system library search path.
    ///
    /// Binds once up front so a missing library is reported before any
    /// document is touched.
    pub fn from_env() -> Result<Self, crate::error::Pdf2LongError> {
        let library = std::env::var_os("PDFIUM_LIB_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::with_library(library)
    }

    /// Bind to an explicit library file or directory.
    pub fn with_library(library: Option<PathBuf>) -> Result<Self, crate::error::Pdf2LongError> {
        let backend = Self { library };
        backend
            .bind()
            .map_err(crate::error::Pdf2LongError::PdfiumBindingFailed)?;
        Ok(backend)
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match &self.library {
            Some(dir) if dir.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            Some(file) => Pdfium::bind_to_library(file),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| e.to_string())?;
        Ok(Pdfium::new(bindings))
    }

    fn engine(&self, path: &Path) -> Result<Pdfium, DocumentOpenError> {
        self.bind()
            .map_err(|detail| DocumentOpenError::EngineUnavailable {
                path: path.to_path_buf(),
                detail,
            })
    }
}

impl RasterBackend for PdfiumBackend {
    fn page_count(&self, path: &Path, password: Option<&str>) -> Result<usize, DocumentOpenError> {
        let pdfium = self.engine(path)?;
        let document = pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| classify_load_error(path, password, format!("{:?}", e)))?;
        Ok(document.pages().len() as usize)
    }

    fn render_pages(
        &self,
        path: &Path,
        password: Option<&str>,
        indices: &[usize],
        scale: f32,
        on_page: &mut PageSink<'_>,
    ) -> Result<(), DocumentOpenError> {
        let pdfium = self.engine(path)?;
        let document = pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| classify_load_error(path, password, format!("{:?}", e)))?;

        let pages = document.pages();
        let total = pages.len() as usize;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        for &index in indices {
            if index >= total {
                on_page(
                    index,
                    Err(PageError::RenderFailed {
                        index,
                        detail: format!("out of range, document has {} pages", total),
                    }),
                );
                continue;
            }

            let rendered = match pages.get(index as u16) {
                Ok(page) => page
                    .render_with_config(&render_config)
                    .map(|bitmap| bitmap.as_image().into_rgb8()),
                Err(e) => Err(e),
            }
            .map_err(|e| PageError::RenderFailed {
                index,
                detail: format!("{:?}", e),
            });

            if let Ok(ref img) = rendered {
                debug!(
                    "Rendered page {} → {}x{} px",
                    index + 1,
                    img.width(),
                    img.height()
                );
            }
            on_page(index, rendered);
        }

        Ok(())
    }
}

/// Map a pdfium load failure to the matching [`DocumentOpenError`].
///
/// pdfium reports password problems through its internal error code; the
/// debug rendering of the error is the only stable place it surfaces.
fn classify_load_error(path: &Path, password: Option<&str>, detail: String) -> DocumentOpenError {
    let path = path.to_path_buf();
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            DocumentOpenError::WrongPassword { path }
        } else {
            DocumentOpenError::PasswordRequired { path }
        }
    } else if detail.contains("FileError") || detail.contains("NotFound") {
        DocumentOpenError::FileNotFound { path }
    } else {
        DocumentOpenError::CorruptPdf { path, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_errors_depend_on_supplied_password() {
        let p = Path::new("locked.pdf");
        let detail = "PdfiumLibraryInternalError(PasswordError)".to_string();
        assert!(matches!(
            classify_load_error(p, None, detail.clone()),
            DocumentOpenError::PasswordRequired { .. }
        ));
        assert!(matches!(
            classify_load_error(p, Some("nope"), detail),
            DocumentOpenError::WrongPassword { .. }
        ));
    }

    #[test]
    fn other_errors_are_corruption() {
        let err = classify_load_error(
            Path::new("bad.pdf"),
            None,
            "PdfiumLibraryInternalError(FormatError)".into(),
        );
        match err {
            DocumentOpenError::CorruptPdf { detail, .. } => assert!(detail.contains("FormatError")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_library_is_a_binding_error() {
        let result = PdfiumBackend::with_library(Some(PathBuf::from(
            "/definitely/not/here/libpdfium.so",
        )));
        assert!(matches!(
            result,
            Err(crate::error::Pdf2LongError::PdfiumBindingFailed(_))
        ));
    }
}
