//! # pptx-illustrator
//!
//! Illustrate PowerPoint decks with AI-generated images derived from each
//! slide's title.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .pptx
//!  │
//!  ├─ 1. Input    validate the package, copy it to the output path
//!  ├─ 2. Extract  find a title per slide (placeholder → font size → short text)
//!  ├─ 3. Prompt   enrich the title with a keyword phrase and quality suffix
//!  ├─ 4. Fetch    DeepAI text2img with retry, download, validate
//!  └─ 5. Mutate   replace the slide's generated picture, save the deck
//! ```
//!
//! Slides are processed one after another. A slide that fails is recorded
//! in the [`RunReport`] and the run moves on; only configuration and input
//! problems abort it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pptx_illustrator::{illustrate, GeneratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeneratorConfig::builder()
//!         .api_key(std::env::var("DEEPAI_API_KEY")?)
//!         .build()?;
//!     let report = illustrate("messe.pptx", None, &config).await?;
//!     eprintln!(
//!         "{}/{} titled slides illustrated → {}",
//!         report.illustrated_slides,
//!         report.titled_slides,
//!         report.output.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pptx-illustrate` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pptx-illustrator = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod deck;
pub mod error;
pub mod illustrate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GeneratorConfig, GeneratorConfigBuilder, ImageBox, ImagePlacement, TitleRules};
pub use error::{DeckError, GeneratorError, ServiceError, SlideError};
pub use illustrate::{illustrate, illustrate_sync, illustrate_with_service, inspect};
pub use output::{GeneratedImage, RunReport, SlideInfo, SlideOutcome, SlideStatus};
pub use pipeline::service::{DeepAiService, ImageService};
pub use progress::{IllustrationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{compose_prompt, PromptTable};
