//! Result types produced by an illustration run.

use crate::error::{GeneratorError, SlideError};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What the extractor found on one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideInfo {
    /// 0-based position in the deck.
    pub index: usize,
    /// Extracted title, or `"Slide N"` when none was found.
    pub title: String,
    /// False when `title` is synthetic; such slides are skipped.
    pub has_title: bool,
    /// Name of the slide's layout, `"Unknown"` when unavailable.
    pub layout_name: String,
    /// Set when the slide's shapes could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<SlideError>,
}

impl SlideInfo {
    /// 1-based slide number, as shown in PowerPoint.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// A downloaded image waiting to be inserted.
///
/// The file lives in the run's scoped temp directory and disappears with it.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// 0-based slide the image was generated for.
    pub slide_index: usize,
    /// Local file holding the image bytes.
    pub file_path: PathBuf,
    /// True once the bytes decoded as an image.
    pub validated: bool,
    /// Sniffed format, used for the media part's extension and content type.
    pub format: ImageFormat,
}

impl GeneratedImage {
    /// File extension for the media part (`jpg`, `png`, ...).
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("jpg")
    }

    /// MIME type registered in `[Content_Types].xml`.
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// How a single slide ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlideStatus {
    /// The picture was inserted and the deck saved.
    Illustrated { picture_name: String },
    /// No usable title; nothing was requested.
    Skipped,
    /// One of the stages failed for this slide.
    Failed { error: SlideError },
}

/// Per-slide record kept in the [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideOutcome {
    /// 0-based slide index.
    pub slide_index: usize,
    pub title: String,
    /// Prompt sent to the service; `None` for skipped slides.
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub status: SlideStatus,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub total_slides: usize,
    /// Slides that had a real title and were attempted.
    pub titled_slides: usize,
    /// Slides that received an image.
    pub illustrated_slides: usize,
    /// One entry per slide, in deck order.
    pub outcomes: Vec<SlideOutcome>,
    pub duration_ms: u64,
}

impl RunReport {
    /// A run succeeds when at least one slide received an image.
    pub fn is_success(&self) -> bool {
        self.illustrated_slides > 0
    }

    /// Errors of the slides that failed, in deck order.
    pub fn errors(&self) -> impl Iterator<Item = &SlideError> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            SlideStatus::Failed { error } => Some(error),
            _ => None,
        })
    }

    /// Turn an unsuccessful run into [`GeneratorError::NothingIllustrated`].
    pub fn into_result(self) -> Result<Self, GeneratorError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GeneratorError::NothingIllustrated {
                titled: self.titled_slides,
                total: self.total_slides,
            })
        }
    }
}
