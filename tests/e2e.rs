//! End-to-end integration tests for edgequake-pdf2long.
//!
//! These tests render real PDF files from `./test_cases/` through pdfium.
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless a pdfium library is available.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use edgequake_pdf2long::{
    convert_batch, convert_document, inspect, ConversionConfig, ConversionProgressCallback,
    NoopProgressCallback, OutputFormat, MAX_IMAGE_DIMENSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Every PDF in `test_cases/`, sorted.
fn all_test_pdfs() -> Vec<PathBuf> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(test_cases_dir())
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")))
                .collect()
        })
        .unwrap_or_default();
    pdfs.sort();
    pdfs
}

// ── Inspect tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_arxiv_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let config = ConversionConfig::default();

    let info = inspect(&path, &config).await.expect("inspect() should succeed");

    assert_eq!(info.page_count, 15, "Attention paper should have 15 pages");
    assert!(info.file_size_bytes > 0);
    println!("Info: {:?}", info);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let result = inspect("/definitely/not/a/real/file.pdf", &ConversionConfig::default()).await;
    assert!(
        result.is_err(),
        "inspect() should return Err for nonexistent file"
    );
}

// ── Conversion tests ─────────────────────────────────────────────────────────

/// 15 pages at 5 per image → exactly three parts, each as wide as a page.
#[tokio::test]
async fn test_convert_arxiv_in_parts() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let out = tempfile::tempdir().unwrap();

    let config = ConversionConfig::builder()
        .scale_factor(1.0)
        .pages_per_output(5)
        .build()
        .expect("valid config");

    let report = convert_document(&path, out.path(), &config)
        .await
        .expect("conversion should succeed");

    assert_eq!(report.rendered_pages, 15);
    assert!(report.page_errors.is_empty(), "{:?}", report.page_errors);
    assert_eq!(report.outputs.len(), 3);
    for (i, output) in report.outputs.iter().enumerate() {
        let name = output.path.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, format!("attention_is_all_you_need_part{}.jpg", i + 1));
        let dims = image::image_dimensions(&output.path).unwrap();
        assert_eq!(dims, (output.width, output.height));
        assert!(output.height <= MAX_IMAGE_DIMENSION);
    }
    println!("Outputs: {:#?}", report.outputs);
}

/// Doubling the scale doubles the rendered width.
#[tokio::test]
async fn test_scale_factor_changes_width() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let out1 = tempfile::tempdir().unwrap();
    let out2 = tempfile::tempdir().unwrap();

    let at = |scale: f32| {
        ConversionConfig::builder()
            .scale_factor(scale)
            .pages_per_output(1)
            .output_format(OutputFormat::Png)
            .build()
            .unwrap()
    };

    let small = convert_document(&path, out1.path(), &at(1.0)).await.unwrap();
    let large = convert_document(&path, out2.path(), &at(2.0)).await.unwrap();

    let w1 = small.outputs[0].width as i64;
    let w2 = large.outputs[0].width as i64;
    assert!((w2 - 2 * w1).abs() <= 2, "widths {w1} and {w2}");
}

/// Every sample PDF converts, with live progress events.
#[tokio::test]
async fn test_convert_all_test_cases() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let inputs = all_test_pdfs();
    if inputs.is_empty() {
        println!("SKIP — no PDFs in {}", test_cases_dir().display());
        return;
    }

    struct Counter(AtomicUsize);
    impl ConversionProgressCallback for Counter {
        fn on_page_progress(&self, _completed: usize, _total: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let counter = Arc::new(Counter(AtomicUsize::new(0)));
    let out = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .scale_factor(1.0)
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    let summary = convert_batch(&inputs, out.path(), &config).await.unwrap();

    assert_eq!(summary.documents.len(), inputs.len());
    assert_eq!(summary.failed(), 0, "{:?}", summary.failed_documents());
    let pages: usize = summary.documents.iter().map(|d| d.total_pages).sum();
    assert!(counter.0.load(Ordering::SeqCst) >= pages);
    for path in summary.output_paths() {
        assert!(path.exists(), "missing {}", path.display());
    }
}

// ── Callback tests ───────────────────────────────────────────────────────────

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<ConversionConfig>();
}
