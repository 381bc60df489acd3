//! CLI binary for pptx-illustrator.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GeneratorConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pptx_illustrator::config::{API_KEY_ENV, DEFAULT_API_URL};
use pptx_illustrator::{
    compose_prompt, illustrate, inspect, GeneratorConfig, IllustrationProgressCallback,
    ProgressCallback,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

/// Terminal progress callback: one bar over the titled slides plus a log
/// line per slide.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the slide currently being illustrated.
    slide_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many slides have titles.
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading slides…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            slide_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, titled: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(titled as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Illustrating");
    }

    fn elapsed(&self) -> String {
        let secs = self
            .slide_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl IllustrationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_slides: usize, titled_slides: usize) {
        self.activate_bar(titled_slides);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{titled_slides} of {total_slides} slides have a title"
            ))
        ));
    }

    fn on_slide_start(&self, slide_num: usize, _total: usize, title: &str) {
        if let Ok(mut started) = self.slide_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("slide {slide_num}: {title}"));
    }

    fn on_slide_complete(&self, slide_num: usize, total: usize) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            green("✓"),
            slide_num,
            total,
            self.elapsed()
        ));
        self.bar.inc(1);
    }

    fn on_slide_skipped(&self, slide_num: usize, total: usize) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            dim("·"),
            slide_num,
            total,
            dim("no title")
        ));
    }

    fn on_slide_error(&self, slide_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            slide_num,
            total,
            red(&msg),
            self.elapsed()
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, titled_slides: usize, illustrated: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 && illustrated > 0 {
            eprintln!(
                "{} {} slides illustrated",
                green("✔"),
                bold(&illustrated.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides illustrated  ({} failed)",
                if illustrated == 0 { red("✘") } else { cyan("⚠") },
                bold(&illustrated.to_string()),
                titled_slides,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Illustrate a deck (writes messe_with_images.pptx next to it)
  pptx-illustrate messe.pptx

  # Explicit output and key
  pptx-illustrate messe.pptx -o illustrated/messe.pptx --api-key $KEY

  # Show titles and prompts without calling the API
  pptx-illustrate --dry-run messe.pptx

  # Machine-readable run report
  pptx-illustrate --json messe.pptx > report.json

ENVIRONMENT VARIABLES:
  DEEPAI_API_KEY   DeepAI API key (overridden by --api-key)
  RUST_LOG         Log filter, e.g. pptx_illustrator=debug

Slides are processed one by one. A picture named generated_image_slide_<N>
is placed on the right of each titled slide; rerunning on an output deck
replaces those pictures instead of adding new ones.
"#;

/// Add AI-generated illustrations to PowerPoint slides.
#[derive(Parser, Debug)]
#[command(
    name = "pptx-illustrate",
    version,
    about = "Add AI-generated illustrations to PowerPoint slides based on their titles",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// The .pptx file to illustrate.
    input: PathBuf,

    /// Output file. Default: <input stem>_with_images.pptx next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// DeepAI API key.
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Text-to-image endpoint.
    #[arg(long, env = "PPTX_ILLUSTRATE_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Generation attempts per slide.
    #[arg(long, env = "PPTX_ILLUSTRATE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "PPTX_ILLUSTRATE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Pause between slides in milliseconds.
    #[arg(long, env = "PPTX_ILLUSTRATE_SLIDE_DELAY_MS", default_value_t = 1000)]
    slide_delay_ms: u64,

    /// Print each slide's title and prompt, then exit. No API key needed.
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PPTX_ILLUSTRATE_NO_PROGRESS")]
    no_progress: bool,

    /// Log file (plain text, appended).
    #[arg(long, env = "PPTX_ILLUSTRATE_LOG_FILE", default_value = "pptx-illustrator.log")]
    log_file: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO lines would tear through the progress bar; the bar says enough.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dry_run;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let _log_guard = init_logging(filter, cli.verbose, &cli.log_file);

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let config = GeneratorConfig::default();
        let slides = inspect(&cli.input, &config).context("Failed to read presentation")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&slides).context("Failed to serialise slides")?
            );
            return Ok(());
        }
        for slide in &slides {
            if slide.has_title {
                println!("{:>3}  {}", slide.number(), bold(&slide.title));
                println!(
                    "     {}",
                    dim(&compose_prompt(&slide.title, slide.index, &config.prompts))
                );
            } else {
                println!("{:>3}  {}", slide.number(), dim("(no title, skipped)"));
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn IllustrationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = illustrate(&cli.input, cli.output.as_deref(), &config)
        .await
        .context("Illustration failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} titled slides  {}ms  →  {}",
            if report.illustrated_slides == report.titled_slides {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.illustrated_slides,
            report.titled_slides,
            report.duration_ms,
            bold(&report.output.display().to_string()),
        );
        for err in report.errors() {
            eprintln!("   {}", red(&err.to_string()));
        }
    }

    report.into_result().context("Illustration failed")?;
    Ok(())
}

/// Stderr output filtered by `RUST_LOG` or `default_filter`, plus a plain
/// text copy in `log_file`. The returned guard flushes the file on drop.
fn init_logging(default_filter: &str, verbose: bool, log_file: &Path) -> Option<WorkerGuard> {
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let dir = match log_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = log_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pptx-illustrator.log".to_string());
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&dir);

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(if verbose { "debug" } else { "info" }));
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry().with(stderr_layer).init();
            tracing::warn!("Log file {} unavailable: {}", log_file.display(), e);
            None
        }
    }
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .api_url(cli.api_url.clone())
        .max_retries(cli.max_retries)
        .request_timeout_secs(cli.timeout)
        .slide_delay_ms(cli.slide_delay_ms);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
