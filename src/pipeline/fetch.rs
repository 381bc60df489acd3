//! Image fetching: prompt → validated image file on disk.
//!
//! ## Retry Strategy
//!
//! Generation is attempted up to `max_retries` times in total. A failed
//! attempt waits `retry_delay_ms` before the next one; an HTTP 429 waits the
//! longer `rate_limit_delay_ms` instead but still counts as an attempt, so a
//! service that keeps rate-limiting cannot stall a slide forever. No wait
//! follows the last attempt.
//!
//! The download that follows a successful generation is tried once. A
//! corrupt or unreachable image is reported for the slide, not retried,
//! because a fresh generation would cost another API credit.

use crate::config::GeneratorConfig;
use crate::error::{ServiceError, SlideError};
use crate::output::GeneratedImage;
use crate::pipeline::service::ImageService;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Ask the service for an image URL, retrying per the configured policy.
///
/// `slide_num` is 1-based and only used for logs and errors.
pub async fn generate_with_retry(
    service: &dyn ImageService,
    prompt: &str,
    slide_num: usize,
    config: &GeneratorConfig,
) -> Result<String, SlideError> {
    let attempts = config.max_retries.max(1);
    let mut last_err: Option<ServiceError> = None;

    for attempt in 1..=attempts {
        match service.generate(prompt).await {
            Ok(url) => {
                debug!("Slide {}: image URL after {} attempt(s): {}", slide_num, attempt, url);
                return Ok(url);
            }
            Err(e) => {
                let wait_ms = match e {
                    ServiceError::RateLimited => config.rate_limit_delay_ms,
                    _ => config.retry_delay_ms,
                };
                warn!(
                    "Slide {}: attempt {}/{} failed: {}",
                    slide_num, attempt, attempts, e
                );
                last_err = Some(e);
                if attempt < attempts {
                    sleep(Duration::from_millis(wait_ms)).await;
                }
            }
        }
    }

    Err(SlideError::Generation {
        slide: slide_num,
        attempts,
        detail: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Download `url` into `dir` and check that it decodes as an image.
///
/// The file is named `slide_<N>_image.<ext>`, with the extension taken from
/// the sniffed format.
pub async fn download_image(
    service: &dyn ImageService,
    url: &str,
    slide_index: usize,
    dir: &Path,
) -> Result<GeneratedImage, SlideError> {
    let slide_num = slide_index + 1;
    let download_err = |detail: String| SlideError::Download {
        slide: slide_num,
        detail,
    };

    let bytes = service
        .download(url)
        .await
        .map_err(|e| download_err(e.to_string()))?;
    if bytes.is_empty() {
        return Err(download_err("empty response body".to_string()));
    }

    let format = image::guess_format(&bytes).unwrap_or(ImageFormat::Jpeg);
    let ext = format.extensions_str().first().copied().unwrap_or("jpg");
    let file_path = dir.join(format!("slide_{slide_num}_image.{ext}"));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| download_err(format!("write {}: {e}", file_path.display())))?;

    let (width, height) = validate_image(file_path.clone())
        .await
        .map_err(download_err)?;
    info!(
        "Slide {}: downloaded {}x{} {:?} image ({} bytes)",
        slide_num,
        width,
        height,
        format,
        bytes.len()
    );

    Ok(GeneratedImage {
        slide_index,
        file_path,
        validated: true,
        format,
    })
}

/// Generate and download the image for one slide.
pub async fn fetch_image(
    service: &dyn ImageService,
    prompt: &str,
    slide_index: usize,
    dir: &Path,
    config: &GeneratorConfig,
) -> Result<GeneratedImage, SlideError> {
    let url = generate_with_retry(service, prompt, slide_index + 1, config).await?;
    download_image(service, &url, slide_index, dir).await
}

/// Decode the file fully; decoding is CPU work, so it runs off the async
/// worker threads.
async fn validate_image(path: PathBuf) -> Result<(u32, u32), String> {
    tokio::task::spawn_blocking(move || {
        let img = image::ImageReader::open(&path)
            .map_err(|e| e.to_string())?
            .with_guessed_format()
            .map_err(|e| e.to_string())?
            .decode()
            .map_err(|e| format!("not a valid image: {e}"))?;
        Ok((img.width(), img.height()))
    })
    .await
    .map_err(|e| format!("validation task failed: {e}"))?
}
