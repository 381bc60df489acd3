//! Progress-callback trait for per-slide illustration events.
//!
//! Inject an [`Arc<dyn IllustrationProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the deck. The CLI renders them as a progress
//! bar; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use pptx_illustrator::{IllustrationProgressCallback, GeneratorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     illustrated: Arc<AtomicUsize>,
//! }
//!
//! impl IllustrationProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide_num: usize, total_slides: usize) {
//!         self.illustrated.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{} illustrated", slide_num, total_slides);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     illustrated: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = GeneratorConfig::builder()
//!     .progress_callback(counter as Arc<dyn IllustrationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each slide.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Slide numbers are 1-based.
pub trait IllustrationProgressCallback: Send + Sync {
    /// Called once after titles are extracted, before any network call.
    fn on_run_start(&self, total_slides: usize, titled_slides: usize) {
        let _ = (total_slides, titled_slides);
    }

    /// Called before the prompt for a titled slide is sent.
    fn on_slide_start(&self, slide_num: usize, total_slides: usize, title: &str) {
        let _ = (slide_num, total_slides, title);
    }

    /// Called when a slide has received its image and the deck was saved.
    fn on_slide_complete(&self, slide_num: usize, total_slides: usize) {
        let _ = (slide_num, total_slides);
    }

    /// Called for slides without a usable title.
    fn on_slide_skipped(&self, slide_num: usize, total_slides: usize) {
        let _ = (slide_num, total_slides);
    }

    /// Called when generation, download or insertion failed for a slide.
    fn on_slide_error(&self, slide_num: usize, total_slides: usize, error: &str) {
        let _ = (slide_num, total_slides, error);
    }

    /// Called once after every slide has been visited.
    fn on_run_complete(&self, titled_slides: usize, illustrated: usize) {
        let _ = (titled_slides, illustrated);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IllustrationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn IllustrationProgressCallback>;
