//! PDF rasterisation: render every page of a document into scratch PNGs.
//!
//! ## Fork/join
//!
//! Two kinds of blocking task share the work:
//!
//! * **Rasterisers**: page indices are dealt round-robin to at most
//!   `workers` tasks (one per CPU core by default, never more than the page
//!   count). Each opens its own document handle and hands every raster to a
//!   bounded channel as soon as it is ready.
//! * **Encoders**: the coordinating task turns each raster into a short
//!   blocking task that writes `page_{index:05}.png` into the scratch
//!   directory. At most `workers` encoders run at once, and the channel holds
//!   at most `workers` rasters, so memory stays bounded when encoding is the
//!   slow side.
//!
//! Engines that serialise rasterisation (pdfium holds a process-wide lock
//! for the lifetime of each binding) therefore never serialise encoding and
//! disk writes, which run on the encoders.
//!
//! The coordinating task is the only place progress and log callbacks fire.
//! The renderer returns only after every task has been joined, with pages
//! sorted by index: completion order is whatever the scheduler made of it,
//! and nothing downstream may depend on it.
//!
//! ## Failure isolation
//!
//! A page that fails to render or save becomes a [`PageError`] and is left
//! out; the other pages still complete. Only failing to open the document at
//! all is fatal.

use crate::error::{PageError, Pdf2LongError};
use crate::output::RenderedPage;
use crate::pipeline::backend::RasterBackend;
use crate::progress::{emit, ConversionProgressCallback, LogLevel};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinSet;
use tracing::debug;

/// Everything one document render needs.
#[derive(Debug, Clone)]
pub struct RenderJob<'a> {
    pub pdf_path: &'a Path,
    /// Shared by all workers of this document; file names never collide.
    pub scratch_dir: &'a Path,
    pub scale: f32,
    pub password: Option<&'a str>,
    /// Upper bound on parallel rasterisers, and on parallel encoders.
    pub workers: usize,
}

/// Pages that rendered, sorted by index, plus the ones that did not.
#[derive(Debug, Default)]
pub struct RenderOutcome {
    pub total_pages: usize,
    pub pages: Vec<RenderedPage>,
    pub errors: Vec<PageError>,
}

type PageOutcome = Result<RenderedPage, PageError>;
type Raster = (usize, Result<RgbImage, PageError>);

/// Rasterise every page of `job.pdf_path` into `job.scratch_dir`.
///
/// `on_progress(completed, total)` is called once per settled page with
/// `completed` rising by one each time; a zero-page document yields a
/// single `(0, 0)`.
///
/// # Errors
/// [`Pdf2LongError::DocumentOpen`] when the document cannot be opened.
pub async fn render_document(
    backend: Arc<dyn RasterBackend>,
    job: &RenderJob<'_>,
    observer: &dyn ConversionProgressCallback,
    on_progress: &mut (dyn FnMut(usize, usize) + Send),
) -> Result<RenderOutcome, Pdf2LongError> {
    let path = job.pdf_path.to_path_buf();
    let password = job.password.map(str::to_string);

    let total = {
        let backend = Arc::clone(&backend);
        let path = path.clone();
        let password = password.clone();
        tokio::task::spawn_blocking(move || backend.page_count(&path, password.as_deref()))
            .await
            .map_err(|e| Pdf2LongError::Internal(format!("Page count task panicked: {}", e)))??
    };
    debug!("{}: {} pages", path.display(), total);

    if total == 0 {
        on_progress(0, 0);
        return Ok(RenderOutcome::default());
    }

    let shares = partition(total, job.workers);
    let in_flight = job.workers.max(1);
    debug!("Rendering {} pages on {} workers", total, shares.len());

    let (tx, mut rx) = mpsc::channel::<Raster>(in_flight);
    let mut rasterisers = JoinSet::new();
    for share in shares {
        let tx = tx.clone();
        let backend = Arc::clone(&backend);
        let path = path.clone();
        let password = password.clone();
        let scale = job.scale;
        rasterisers.spawn_blocking(move || {
            rasterise_share(backend.as_ref(), &path, password.as_deref(), &share, scale, &tx)
        });
    }
    // The channel closes once the last rasteriser drops its sender.
    drop(tx);

    let mut tally = Tally::new(total);
    let mut encoders: JoinSet<PageOutcome> = JoinSet::new();

    loop {
        tokio::select! {
            Some((index, raster)) = rx.recv(), if encoders.len() < in_flight => match raster {
                Ok(img) => {
                    let scratch = job.scratch_dir.to_path_buf();
                    encoders.spawn_blocking(move || save_page(&scratch, index, &img));
                }
                Err(e) => tally.settle(Err(e), observer, on_progress),
            },
            Some(joined) = encoders.join_next() => match joined {
                Ok(result) => tally.settle(result, observer, on_progress),
                Err(e) => emit(
                    observer,
                    LogLevel::Error,
                    &format!("Page encoder for '{}' stopped: {}", path.display(), e),
                ),
            },
            else => break,
        }
    }

    while let Some(joined) = rasterisers.join_next().await {
        if let Err(e) = joined {
            emit(
                observer,
                LogLevel::Error,
                &format!("Render worker for '{}' stopped: {}", path.display(), e),
            );
        }
    }

    // A task that panicked never reported the rest of its pages.
    for index in 0..total {
        if !tally.settled[index] {
            let lost: PageOutcome = Err(PageError::RenderFailed {
                index,
                detail: "render worker stopped before reaching this page".into(),
            });
            tally.settle(lost, observer, on_progress);
        }
    }

    let mut outcome = tally.outcome;
    outcome.pages.sort_by_key(|p| p.index);
    outcome.errors.sort_by_key(PageError::index);
    Ok(outcome)
}

/// Settled pages of one document, counted once each.
struct Tally {
    settled: Vec<bool>,
    completed: usize,
    outcome: RenderOutcome,
}

impl Tally {
    fn new(total: usize) -> Self {
        Self {
            settled: vec![false; total],
            completed: 0,
            outcome: RenderOutcome {
                total_pages: total,
                pages: Vec::with_capacity(total),
                errors: Vec::new(),
            },
        }
    }

    fn settle(
        &mut self,
        result: PageOutcome,
        observer: &dyn ConversionProgressCallback,
        on_progress: &mut (dyn FnMut(usize, usize) + Send),
    ) {
        let index = match &result {
            Ok(page) => page.index,
            Err(e) => e.index(),
        };
        if index >= self.settled.len() || self.settled[index] {
            debug!("Ignoring duplicate or out-of-range page report {}", index);
            return;
        }
        self.settled[index] = true;
        self.completed += 1;

        match result {
            Ok(page) => self.outcome.pages.push(page),
            Err(e) => {
                emit(observer, LogLevel::Warn, &e.to_string());
                self.outcome.errors.push(e);
            }
        }
        on_progress(self.completed, self.settled.len());
    }
}

/// Body of one rasteriser: forward each page raster to the coordinator.
fn rasterise_share(
    backend: &dyn RasterBackend,
    path: &Path,
    password: Option<&str>,
    share: &[usize],
    scale: f32,
    tx: &Sender<Raster>,
) {
    // A send only fails once the coordinator itself was dropped.
    let opened = backend.render_pages(path, password, share, scale, &mut |index, rendered| {
        let _ = tx.blocking_send((index, rendered));
    });

    if let Err(e) = opened {
        for &index in share {
            let _ = tx.blocking_send((
                index,
                Err(PageError::RenderFailed {
                    index,
                    detail: e.to_string(),
                }),
            ));
        }
    }
}

/// Write one page to scratch space as PNG.
fn save_page(scratch: &Path, index: usize, img: &RgbImage) -> Result<RenderedPage, PageError> {
    let path = scratch.join(page_file_name(index));
    img.save_with_format(&path, ImageFormat::Png)
        .map_err(|e| PageError::SaveFailed {
            index,
            path: path.clone(),
            detail: e.to_string(),
        })?;
    Ok(RenderedPage {
        index,
        width: img.width(),
        height: img.height(),
        path,
    })
}

/// Scratch file name for a page; zero-padded so a directory listing sorts in page order.
pub fn page_file_name(index: usize) -> PathBuf {
    PathBuf::from(format!("page_{:05}.png", index))
}

/// Deal `0..total` round-robin into at most `workers` non-empty shares.
pub fn partition(total: usize, workers: usize) -> Vec<Vec<usize>> {
    let n = workers.clamp(1, total.max(1));
    let mut shares: Vec<Vec<usize>> = (0..n).map(|_| Vec::new()).collect();
    for index in 0..total {
        shares[index % n].push(index);
    }
    shares.retain(|s| !s.is_empty());
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentOpenError;
    use crate::progress::NoopProgressCallback;
    use image::Rgb;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[test]
    fn partition_covers_every_page_once() {
        let shares = partition(10, 4);
        assert_eq!(shares.len(), 4);
        let mut all: Vec<usize> = shares.concat();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        assert_eq!(shares[0], vec![0, 4, 8]);
        assert_eq!(shares[3], vec![3, 7]);
    }

    #[test]
    fn partition_caps_workers_at_page_count() {
        assert_eq!(partition(3, 16).len(), 3);
        assert_eq!(partition(5, 0), vec![vec![0, 1, 2, 3, 4]]);
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn page_file_names_sort_in_page_order() {
        let mut names: Vec<PathBuf> = [10, 2, 100, 1].iter().map(|&i| page_file_name(i)).collect();
        names.sort();
        assert_eq!(names[0], PathBuf::from("page_00001.png"));
        assert_eq!(names[3], PathBuf::from("page_00100.png"));
    }

    /// Pages are `index + 1` pixels tall; `failing` pages error out.
    struct StripBackend {
        pages: usize,
        failing: Vec<usize>,
    }

    impl RasterBackend for StripBackend {
        fn page_count(&self, _: &Path, _: Option<&str>) -> Result<usize, DocumentOpenError> {
            Ok(self.pages)
        }

        fn render_pages(
            &self,
            _: &Path,
            _: Option<&str>,
            indices: &[usize],
            _: f32,
            on_page: &mut crate::pipeline::backend::PageSink<'_>,
        ) -> Result<(), DocumentOpenError> {
            for &index in indices.iter().rev() {
                if self.failing.contains(&index) {
                    on_page(
                        index,
                        Err(PageError::RenderFailed {
                            index,
                            detail: "broken".into(),
                        }),
                    );
                } else {
                    let height = index as u32 + 1;
                    on_page(index, Ok(RgbImage::from_pixel(2, height, Rgb([0, 0, 0]))));
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn pages_come_back_sorted_without_failures() {
        let scratch = tempfile::tempdir().unwrap();
        let backend = Arc::new(StripBackend {
            pages: 12,
            failing: vec![5],
        });
        let job = RenderJob {
            pdf_path: Path::new("strip.pdf"),
            scratch_dir: scratch.path(),
            scale: 1.0,
            password: None,
            workers: 3,
        };
        let mut calls = Vec::new();
        let outcome = render_document(backend, &job, &NoopProgressCallback, &mut |c, t| {
            calls.push((c, t))
        })
        .await
        .unwrap();

        let indices: Vec<usize> = outcome.pages.iter().map(|p| p.index).collect();
        let expected: Vec<usize> = (0..12).filter(|&i| i != 5).collect();
        assert_eq!(indices, expected);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index(), 5);
        assert_eq!(calls, (1..=12).map(|c| (c, 12)).collect::<Vec<_>>());

        let page = &outcome.pages[3];
        assert_eq!((page.width, page.height), (2, 4));
        assert!(page.path.ends_with("page_00003.png"));
        assert!(page.path.exists());
    }

    /// Holds one process-wide lock for the whole of `render_pages`, the way
    /// pdfium's thread-safe binding does, and records how long it was held.
    struct GlobalLockBackend {
        pages: usize,
        page: RgbImage,
        lock: Arc<Mutex<()>>,
        held: Arc<Mutex<Duration>>,
    }

    impl RasterBackend for GlobalLockBackend {
        fn page_count(&self, _: &Path, _: Option<&str>) -> Result<usize, DocumentOpenError> {
            Ok(self.pages)
        }

        fn render_pages(
            &self,
            _: &Path,
            _: Option<&str>,
            indices: &[usize],
            _: f32,
            on_page: &mut crate::pipeline::backend::PageSink<'_>,
        ) -> Result<(), DocumentOpenError> {
            let _guard = self.lock.lock().unwrap();
            let start = Instant::now();
            for &index in indices {
                on_page(index, Ok(self.page.clone()));
            }
            *self.held.lock().unwrap() += start.elapsed();
            Ok(())
        }
    }

    #[tokio::test]
    async fn encoding_happens_outside_the_raster_lock() {
        let scratch = tempfile::tempdir().unwrap();
        let page = RgbImage::from_fn(1024, 1024, |x, y| {
            Rgb([((x * 7) ^ (y * 13)) as u8, (x * y) as u8, (x + y * 3) as u8])
        });
        let held = Arc::new(Mutex::new(Duration::ZERO));
        let backend = Arc::new(GlobalLockBackend {
            pages: 4,
            page,
            lock: Arc::new(Mutex::new(())),
            held: Arc::clone(&held),
        });
        let job = RenderJob {
            pdf_path: Path::new("locked.pdf"),
            scratch_dir: scratch.path(),
            scale: 1.0,
            password: None,
            workers: 2,
        };

        let start = Instant::now();
        let outcome = render_document(backend, &job, &NoopProgressCallback, &mut |_, _| {})
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome.pages.len(), 4);
        assert!(outcome.errors.is_empty());
        assert!(outcome.pages.iter().all(|p| p.path.exists()));
        // Four PNG encodes dominate the run; the lock only covers cloning.
        let held = *held.lock().unwrap();
        assert!(
            held * 2 < elapsed,
            "raster lock held for {:?} of {:?}",
            held,
            elapsed
        );
    }
}
