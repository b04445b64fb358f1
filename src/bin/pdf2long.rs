//! CLI binary for edgequake-pdf2long.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2long::pipeline::input::collect_inputs;
use edgequake_pdf2long::{
    convert_batch, inspect, BatchSummary, ConversionConfig, ConversionProgressCallback,
    DocumentReport, LogLevel, OutputFormat, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one batch-wide percentage bar with log lines
/// printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, doc_num: usize, total_docs: usize, path: &Path) {
        self.bar.set_prefix(format!("{doc_num}/{total_docs}"));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("[{doc_num}/{total_docs}] {}", path.display()))
        ));
    }

    fn on_log(&self, level: LogLevel, message: &str) {
        let line = match level {
            LogLevel::Info => format!("  {}", dim(message)),
            LogLevel::Warn => format!("  {} {}", yellow("⚠"), yellow(message)),
            LogLevel::Error => format!("  {} {}", red("✗"), red(message)),
        };
        self.bar.println(line);
    }

    fn on_batch_progress(&self, percent: u8, status: &str) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(status.to_string());
    }

    fn on_document_complete(&self, report: &DocumentReport) {
        if !report.is_failed() {
            self.bar.println(format!(
                "  {} {}  {}",
                green("✓"),
                report.display_name(),
                dim(&format!(
                    "{} image(s), {}/{} pages",
                    report.outputs.len(),
                    report.rendered_pages,
                    report.total_pages
                )),
            ));
        }
    }

    fn on_batch_complete(&self, _summary: &BatchSummary) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One long JPEG per 10 pages, next to the current directory
  pdf2long slides.pdf -o long_images

  # Every PDF under a folder, 5 pages per PNG, sharper rendering
  pdf2long ./papers --pages-per-image 5 --format png --scale 3 -o out

  # Encrypted document
  pdf2long --password secret statement.pdf -o out

  # Page counts only
  pdf2long --inspect-only *.pdf

  # Machine-readable batch summary
  pdf2long --json report.pdf -o out > summary.json

OUTPUT NAMING:
  <name>.jpg                        all pages fit in one image
  <name>_part1.jpg, _part2.jpg, …   document split into several images

  A single image may not exceed 65 500 px in height. Chunks that would are
  skipped with a warning; lower --pages-per-image or --scale to fit.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  PDF2LONG_*              Fallback for every flag, e.g. PDF2LONG_SCALE=1.5
  RUST_LOG                Override log filtering
"#;

/// Convert PDF files into vertically stitched long images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2long",
    version,
    about = "Convert PDF files into vertically stitched long images",
    long_about = "Render every page of one or more PDF documents and stack them top to bottom \
into long JPEG or PNG images, a configurable number of pages per image. Directories are \
searched recursively for *.pdf files.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files or directories containing PDF files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Folder receiving the long images.
    #[arg(short, long, env = "PDF2LONG_OUTPUT", default_value = "long_images")]
    output: PathBuf,

    /// Zoom factor applied to each page's native size.
    #[arg(long, env = "PDF2LONG_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Pages stacked into each output image.
    #[arg(long, env = "PDF2LONG_PAGES_PER_IMAGE", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..))]
    pages_per_image: u32,

    /// Output image format.
    #[arg(long, env = "PDF2LONG_FORMAT", value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// JPEG quality (10–100). Ignored for PNG.
    #[arg(long, env = "PDF2LONG_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(10..=100))]
    quality: u8,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2LONG_PASSWORD")]
    password: Option<String>,

    /// Parallel page renderers. Defaults to the number of CPU cores.
    #[arg(short, long, env = "PDF2LONG_JOBS")]
    jobs: Option<usize>,

    /// Print the batch summary as JSON on stdout.
    #[arg(long, env = "PDF2LONG_JSON")]
    json: bool,

    /// Print page counts only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2LONG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2LONG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2LONG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    #[value(alias = "jpg")]
    Jpeg,
    Png,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Png => OutputFormat::Png,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar prints observer log lines itself, so library INFO
    // logs would only duplicate them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let inputs = collect_inputs(&cli.inputs);
    if inputs.is_empty() {
        anyhow::bail!("No PDF files found in the given inputs");
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return run_inspect(&cli, &inputs, &config).await;
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let summary = convert_batch(&inputs, &cli.output, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary, &cli.output);
    }

    if summary.failed() > 0 {
        if !cli.quiet && !cli.json {
            for name in summary.failed_documents() {
                eprintln!("  {} {}", red("✗"), name);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run_inspect(cli: &Cli, inputs: &[PathBuf], config: &ConversionConfig) -> Result<()> {
    let mut infos = Vec::with_capacity(inputs.len());
    for input in inputs {
        let info = inspect(input, config)
            .await
            .with_context(|| format!("Failed to inspect {}", input.display()))?;
        infos.push(info);
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&infos).context("Failed to serialize metadata")?
        );
    } else {
        for info in &infos {
            println!("File:         {}", info.path.display());
            println!("Pages:        {}", info.page_count);
            println!("Size:         {} bytes", info.file_size_bytes);
        }
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, output_dir: &Path) {
    let failed = summary.failed();
    let images = summary.output_paths().len();
    eprintln!(
        "{}  {}/{} documents  {} image(s)  {}ms  →  {}",
        if failed == 0 { green("✔") } else { cyan("⚠") },
        summary.succeeded(),
        summary.documents.len(),
        images,
        summary.total_duration_ms,
        bold(&output_dir.display().to_string()),
    );
    let skipped: usize = summary.documents.iter().map(|d| d.skipped_chunks.len()).sum();
    let page_errors: usize = summary.documents.iter().map(|d| d.page_errors.len()).sum();
    if skipped > 0 || page_errors > 0 {
        eprintln!(
            "   {} page(s) failed to render  /  {} image(s) skipped",
            dim(&page_errors.to_string()),
            dim(&skipped.to_string()),
        );
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .scale_factor(cli.scale)
        .pages_per_output(cli.pages_per_image as usize)
        .output_format(cli.format.into())
        .quality(cli.quality);

    if let Some(jobs) = cli.jobs {
        builder = builder.concurrency(jobs);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
