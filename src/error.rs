//! Error types for the pptx-illustrator library.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`GeneratorError`]: **Fatal**: the run cannot proceed at all (no API
//!   key, missing input, unreadable deck). Returned as `Err(GeneratorError)`
//!   from the top-level `illustrate*` functions.
//!
//! * [`SlideError`]: **Non-fatal**: one slide failed (API gave up, corrupt
//!   download, insertion error) while every other slide is fine. Stored inside
//!   [`crate::output::SlideOutcome`] so callers see partial success instead of
//!   losing the whole deck to one bad slide.
//!
//! [`DeckError`] and [`ServiceError`] are the lower-level failures of the
//! package layer and of a single network exchange; the pipeline folds them
//! into one of the two tiers above.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pptx-illustrator library.
#[derive(Debug, Error)]
pub enum GeneratorError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No usable API credential was configured.
    #[error("DeepAI API key is not configured.\nSet DEEPAI_API_KEY or pass --api-key <KEY>.")]
    ApiKeyMissing,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Presentation not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is not a zip package, so it cannot be a .pptx.
    #[error("File is not a .pptx presentation: '{path}'\nFirst bytes: {magic:?}")]
    NotAPresentation { path: PathBuf, magic: [u8; 4] },

    /// The package opened but its presentation parts are unusable.
    #[error("Presentation '{path}' is corrupt: {source}")]
    CorruptDeck {
        path: PathBuf,
        #[source]
        source: DeckError,
    },

    /// The presentation has no slides to illustrate.
    #[error("Presentation '{path}' contains no slides")]
    NoSlides { path: PathBuf },

    // ── Outcome errors ────────────────────────────────────────────────────
    /// The run finished but not a single slide received an image.
    ///
    /// Returned by [`crate::output::RunReport::into_result`].
    #[error("No slide was illustrated ({titled} slides with titles, {total} slides total)")]
    NothingIllustrated { titled: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output presentation.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single slide.
///
/// Stored in [`crate::output::SlideOutcome`] when a slide fails. The run
/// always continues with the next slide.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// Title extraction failed; the slide is treated as having no title.
    #[error("Slide {slide}: title extraction failed: {detail}")]
    Extraction { slide: usize, detail: String },

    /// The image API did not produce an image within the retry budget.
    #[error("Slide {slide}: image generation failed after {attempts} attempts: {detail}")]
    Generation {
        slide: usize,
        attempts: u32,
        detail: String,
    },

    /// The generated image could not be downloaded or is not a valid image.
    #[error("Slide {slide}: image download failed: {detail}")]
    Download { slide: usize, detail: String },

    /// The image could not be placed into the deck or the deck not saved.
    #[error("Slide {slide}: image insertion failed: {detail}")]
    Insertion { slide: usize, detail: String },
}

/// Failures of the .pptx package layer.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML in '{part}': {detail}")]
    Xml { part: String, detail: String },

    #[error("missing package part '{0}'")]
    MissingPart(String),

    #[error("slide {index} is out of range (deck has {total} slides)")]
    SlideOutOfRange { index: usize, total: usize },
}

/// A single failed exchange with the image-generation service.
///
/// Every variant is retried by the fetcher; the distinction only changes the
/// wait before the next attempt and what gets logged.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// HTTP 429: the service asks us to slow down.
    #[error("rate limited by the image service")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP 200 but the JSON body has no `output_url`.
    #[error("no output_url in response: {0}")]
    MissingOutputUrl(String),

    /// HTTP 200 but the body is not JSON.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection, TLS, or other transport failure.
    #[error("request error: {0}")]
    Transport(String),
}
