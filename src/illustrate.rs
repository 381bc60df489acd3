//! Run entry points: illustrate a whole deck.
//!
//! A run owns its deck and its scratch directory. Titles are extracted once,
//! then slides are visited in order. Every slide that receives an image is
//! saved to the output file immediately, so an interrupted run keeps the
//! slides it already finished and a rerun replaces rather than duplicates
//! their pictures.

use crate::config::GeneratorConfig;
use crate::deck::Deck;
use crate::error::GeneratorError;
use crate::output::{RunReport, SlideInfo, SlideOutcome, SlideStatus};
use crate::pipeline::service::{DeepAiService, ImageService};
use crate::pipeline::{extract, fetch, input, mutate};
use crate::prompts::compose_prompt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Illustrate a deck using the DeepAI service.
///
/// `output` defaults to `<stem><output_suffix>.pptx` next to the input.
///
/// # Errors
/// Returns `Err(GeneratorError)` only when the run cannot start: no API key,
/// unreadable or invalid input, a deck without slides, or an output that
/// cannot be written. Per-slide failures are reported in the
/// [`RunReport`]; call [`RunReport::into_result`] to treat a run without a
/// single image as an error.
///
/// # Example
/// ```rust,no_run
/// use pptx_illustrator::{illustrate, GeneratorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GeneratorConfig::builder()
///     .api_key(std::env::var("DEEPAI_API_KEY")?)
///     .build()?;
/// let report = illustrate("messe.pptx", None, &config).await?;
/// println!("{}/{} slides illustrated", report.illustrated_slides, report.titled_slides);
/// # Ok(())
/// # }
/// ```
pub async fn illustrate(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &GeneratorConfig,
) -> Result<RunReport, GeneratorError> {
    let service = DeepAiService::from_config(config)?;
    illustrate_with_service(input_path, output_path, Arc::new(service), config).await
}

/// Illustrate a deck with a caller-supplied [`ImageService`].
///
/// No API key is needed here; the service carries its own credentials.
pub async fn illustrate_with_service(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    service: Arc<dyn ImageService>,
    config: &GeneratorConfig,
) -> Result<RunReport, GeneratorError> {
    let started = Instant::now();

    // ── Step 1: Resolve input and output ─────────────────────────────────
    let input_path = input::resolve_input(input_path.as_ref())?;
    let output_path: PathBuf = match output_path {
        Some(p) => p.to_path_buf(),
        None => input::default_output_path(&input_path, &config.output_suffix),
    };
    info!(
        "Illustrating {} → {}",
        input_path.display(),
        output_path.display()
    );

    // ── Step 2: Open the deck ────────────────────────────────────────────
    let mut deck = Deck::open(&input_path).map_err(|source| GeneratorError::CorruptDeck {
        path: input_path.clone(),
        source,
    })?;
    if deck.slide_count() == 0 {
        return Err(GeneratorError::NoSlides { path: input_path });
    }

    // ── Step 3: Copy; the input is never written ─────────────────────────
    input::copy_to_output(&input_path, &output_path).await?;

    // ── Step 4: Extract titles ───────────────────────────────────────────
    let slides = extract::extract_slides(&deck, &config.titles);
    let total = slides.len();
    let titled = slides.iter().filter(|s| s.has_title).count();
    info!("Deck has {} slides, {} with titles", total, titled);
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total, titled);
    }

    // ── Step 5: Illustrate slide by slide ────────────────────────────────
    let scratch = tempfile::Builder::new()
        .prefix("pptx-illustrator-")
        .tempdir()
        .map_err(|e| GeneratorError::Internal(format!("temp dir: {e}")))?;
    debug!("Scratch directory: {}", scratch.path().display());

    let mut outcomes = Vec::with_capacity(total);
    let mut illustrated = 0usize;
    let mut processed = 0usize;

    for slide in &slides {
        let slide_num = slide.number();
        if !slide.has_title {
            let status = match &slide.extraction_error {
                Some(e) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_slide_error(slide_num, total, &e.to_string());
                    }
                    SlideStatus::Failed { error: e.clone() }
                }
                None => {
                    info!("Slide {}/{}: no title, skipped", slide_num, total);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_slide_skipped(slide_num, total);
                    }
                    SlideStatus::Skipped
                }
            };
            outcomes.push(SlideOutcome {
                slide_index: slide.index,
                title: slide.title.clone(),
                prompt: None,
                status,
            });
            continue;
        }

        if processed > 0 && config.slide_delay_ms > 0 {
            sleep(Duration::from_millis(config.slide_delay_ms)).await;
        }
        processed += 1;

        let outcome = illustrate_slide(
            &mut deck,
            slide,
            service.as_ref(),
            scratch.path(),
            &output_path,
            total,
            config,
        )
        .await;
        if matches!(outcome.status, SlideStatus::Illustrated { .. }) {
            illustrated += 1;
        }
        outcomes.push(outcome);
    }

    // ── Step 6: Clean up ─────────────────────────────────────────────────
    let scratch_path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => debug!("Removed scratch directory {}", scratch_path.display()),
        Err(e) => warn!("Could not remove {}: {}", scratch_path.display(), e),
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Run complete: {}/{} titled slides illustrated in {}ms",
        illustrated, titled, duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(titled, illustrated);
    }

    Ok(RunReport {
        input: input_path,
        output: output_path,
        total_slides: total,
        titled_slides: titled,
        illustrated_slides: illustrated,
        outcomes,
        duration_ms,
    })
}

/// Synchronous wrapper around [`illustrate`].
///
/// Creates a temporary tokio runtime internally.
pub fn illustrate_sync(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &GeneratorConfig,
) -> Result<RunReport, GeneratorError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| GeneratorError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(illustrate(input_path, output_path, config))
}

/// Extract slide titles without generating anything.
///
/// Needs no API key and never writes to disk.
pub fn inspect(input_path: impl AsRef<Path>, config: &GeneratorConfig) -> Result<Vec<SlideInfo>, GeneratorError> {
    let path = input::resolve_input(input_path.as_ref())?;
    let deck = Deck::open(&path).map_err(|source| GeneratorError::CorruptDeck {
        path: path.clone(),
        source,
    })?;
    Ok(extract::extract_slides(&deck, &config.titles))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Prompt → image → picture for one titled slide. Never fails the run.
async fn illustrate_slide(
    deck: &mut Deck,
    slide: &SlideInfo,
    service: &dyn ImageService,
    scratch: &Path,
    output: &Path,
    total: usize,
    config: &GeneratorConfig,
) -> SlideOutcome {
    let slide_num = slide.number();
    info!("Slide {}/{}: '{}'", slide_num, total, slide.title);
    if let Some(ref cb) = config.progress_callback {
        cb.on_slide_start(slide_num, total, &slide.title);
    }

    let prompt = compose_prompt(&slide.title, slide.index, &config.prompts);
    let result = match fetch::fetch_image(service, &prompt, slide.index, scratch, config).await {
        Ok(image) => mutate::apply_image(deck, &image, &config.placement, output).await,
        Err(e) => Err(e),
    };

    let status = match result {
        Ok(picture_name) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_slide_complete(slide_num, total);
            }
            SlideStatus::Illustrated { picture_name }
        }
        Err(e) => {
            error!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_slide_error(slide_num, total, &e.to_string());
            }
            SlideStatus::Failed { error: e }
        }
    };

    SlideOutcome {
        slide_index: slide.index,
        title: slide.title.clone(),
        prompt: Some(prompt),
        status,
    }
}
