//! Configuration types for deck illustration.
//!
//! Every tunable of a run (credential, endpoint, timeouts, retry policy,
//! image geometry, title heuristics, keyword table) lives in
//! [`GeneratorConfig`], built via [`GeneratorConfigBuilder`] and handed to each
//! stage explicitly. Nothing in the pipeline reads global state.

use crate::error::GeneratorError;
use crate::progress::ProgressCallback;
use crate::prompts::PromptTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// English Metric Units per inch, the unit of every PresentationML offset.
pub const EMU_PER_INCH: i64 = 914_400;

/// DeepAI text-to-image endpoint.
pub const DEFAULT_API_URL: &str = "https://api.deepai.org/api/text2img";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DEEPAI_API_KEY";

/// Template value shipped in sample scripts; treated as "not configured".
pub const PLACEHOLDER_API_KEY: &str = "your-deepai-api-key-here";

/// Configuration for one illustration run.
///
/// # Example
/// ```rust
/// use pptx_illustrator::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .api_key("my-key")
///     .max_retries(5)
///     .slide_delay_ms(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// DeepAI API key. `None` (or the sample placeholder) aborts the run.
    pub api_key: Option<String>,

    /// Text-to-image endpoint. Default: [`DEFAULT_API_URL`].
    pub api_url: String,

    /// Per-request timeout for generation and download, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Maximum generation attempts per slide, 429s included. Default: 3.
    pub max_retries: u32,

    /// Wait between failed attempts, in milliseconds. Default: 2000.
    pub retry_delay_ms: u64,

    /// Wait after an HTTP 429, in milliseconds. Default: 4000.
    pub rate_limit_delay_ms: u64,

    /// Pause between processed slides, in milliseconds. Default: 1000.
    pub slide_delay_ms: u64,

    /// Suffix appended to the input stem when no output path is given.
    /// Default: `_with_images`.
    pub output_suffix: String,

    /// Where and how large the inserted picture is.
    pub placement: ImagePlacement,

    /// Thresholds for the heuristic title strategies.
    pub titles: TitleRules,

    /// Keyword table used to enrich prompts.
    pub prompts: PromptTable,

    /// Optional per-slide progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 2000,
            rate_limit_delay_ms: 4000,
            slide_delay_ms: 1000,
            output_suffix: "_with_images".to_string(),
            placement: ImagePlacement::default(),
            titles: TitleRules::default(),
            prompts: PromptTable::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("rate_limit_delay_ms", &self.rate_limit_delay_ms)
            .field("slide_delay_ms", &self.slide_delay_ms)
            .field("output_suffix", &self.output_suffix)
            .field("placement", &self.placement)
            .field("titles", &self.titles)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn IllustrationProgressCallback>"),
            )
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Return the API key if it is set to something usable.
    ///
    /// Empty strings and the sample placeholder both count as missing.
    pub fn usable_api_key(&self) -> Result<&str, GeneratorError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && key != PLACEHOLDER_API_KEY => Ok(key),
            _ => Err(GeneratorError::ApiKeyMissing),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn rate_limit_delay_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit_delay_ms = ms;
        self
    }

    pub fn slide_delay_ms(mut self, ms: u64) -> Self {
        self.config.slide_delay_ms = ms;
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    pub fn placement(mut self, placement: ImagePlacement) -> Self {
        self.config.placement = placement;
        self
    }

    pub fn titles(mut self, rules: TitleRules) -> Self {
        self.config.titles = rules;
        self
    }

    pub fn prompts(mut self, table: PromptTable) -> Self {
        self.config.prompts = table;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The API key is not checked here; [`crate::illustrate::illustrate`]
    /// rejects a missing one before any work starts.
    pub fn build(self) -> Result<GeneratorConfig, GeneratorError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(GeneratorError::InvalidConfig(
                "max_retries must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(GeneratorError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        if !(c.placement.max_fraction > 0.0 && c.placement.max_fraction <= 1.0) {
            return Err(GeneratorError::InvalidConfig(format!(
                "placement fraction must be in (0, 1], got {}",
                c.placement.max_fraction
            )));
        }
        if c.output_suffix.is_empty() {
            return Err(GeneratorError::InvalidConfig(
                "output suffix must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Size and position rules for the inserted picture, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImagePlacement {
    /// Preferred picture width. Default: 4in.
    pub default_width: i64,
    /// Preferred picture height. Default: 3in.
    pub default_height: i64,
    /// Upper bound on width/height as a fraction of the slide. Default: 0.4.
    pub max_fraction: f64,
    /// Gap between the picture and the slide's right edge. Default: 0.5in.
    pub right_margin: i64,
}

impl Default for ImagePlacement {
    fn default() -> Self {
        Self {
            default_width: 4 * EMU_PER_INCH,
            default_height: 3 * EMU_PER_INCH,
            max_fraction: 0.4,
            right_margin: EMU_PER_INCH / 2,
        }
    }
}

/// A picture rectangle on a slide, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBox {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl ImagePlacement {
    /// Compute the picture box for a slide of the given size.
    ///
    /// The box hugs the right edge (minus the margin) and is centred
    /// vertically.
    pub fn layout(&self, slide_width: i64, slide_height: i64) -> ImageBox {
        let cap_w = (slide_width as f64 * self.max_fraction).round() as i64;
        let cap_h = (slide_height as f64 * self.max_fraction).round() as i64;
        let width = self.default_width.min(cap_w);
        let height = self.default_height.min(cap_h);
        ImageBox {
            left: slide_width - width - self.right_margin,
            top: (slide_height - height) / 2,
            width,
            height,
        }
    }
}

// ── Title heuristics ─────────────────────────────────────────────────────

/// Thresholds for the heuristic title strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TitleRules {
    /// The largest-font strategy only fires above this size. Default: 20pt.
    pub min_font_pt: f32,
    /// The short-text strategy only accepts texts shorter than this many
    /// characters. Default: 100.
    pub max_fallback_chars: usize,
}

impl Default for TitleRules {
    fn default() -> Self {
        Self {
            min_font_pt: 20.0,
            max_fallback_chars: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = GeneratorConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.request_timeout_secs, 30);
        assert_eq!(c.retry_delay_ms, 2000);
        assert_eq!(c.rate_limit_delay_ms, 4000);
        assert_eq!(c.slide_delay_ms, 1000);
        assert_eq!(c.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn builder_clamps_retries() {
        let c = GeneratorConfig::builder().max_retries(0).build().unwrap();
        assert_eq!(c.max_retries, 1);
    }

    #[test]
    fn builder_rejects_bad_fraction() {
        let placement = ImagePlacement {
            max_fraction: 1.5,
            ..ImagePlacement::default()
        };
        let err = GeneratorConfig::builder()
            .placement(placement)
            .build()
            .unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidConfig(_)));
    }

    #[test]
    fn placeholder_key_is_not_usable() {
        let c = GeneratorConfig::builder()
            .api_key(PLACEHOLDER_API_KEY)
            .build()
            .unwrap();
        assert!(matches!(c.usable_api_key(), Err(GeneratorError::ApiKeyMissing)));

        let c = GeneratorConfig::builder().api_key("  ").build().unwrap();
        assert!(c.usable_api_key().is_err());

        let c = GeneratorConfig::builder().api_key("abc").build().unwrap();
        assert_eq!(c.usable_api_key().unwrap(), "abc");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = GeneratorConfig::builder().api_key("secret-key").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn layout_on_4_3_slide_uses_default_size() {
        // 10in × 7.5in: 40% caps are 4in × 3in, equal to the defaults.
        let b = ImagePlacement::default().layout(9_144_000, 6_858_000);
        assert_eq!(b.width, 4 * EMU_PER_INCH);
        assert_eq!(b.height, 3 * EMU_PER_INCH);
        assert_eq!(b.left, 9_144_000 - 4 * EMU_PER_INCH - EMU_PER_INCH / 2);
        assert_eq!(b.top, (6_858_000 - 3 * EMU_PER_INCH) / 2);
    }

    #[test]
    fn layout_caps_at_fraction_of_small_slide() {
        // 5in × 5in slide: caps are 2in × 2in.
        let side = 5 * EMU_PER_INCH;
        let b = ImagePlacement::default().layout(side, side);
        assert_eq!(b.width, 2 * EMU_PER_INCH);
        assert_eq!(b.height, 2 * EMU_PER_INCH);
        assert_eq!(b.top, (side - b.height) / 2);
        assert!(b.left + b.width <= side);
    }
}
