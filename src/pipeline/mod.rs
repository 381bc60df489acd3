//! Pipeline stages for deck illustration.
//!
//! Each submodule implements one step. Stages pass plain values to each
//! other, which keeps each of them testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompts ──▶ fetch ──▶ mutate
//! (path)    (titles)    (prompt)    (image)   (deck)
//! ```
//!
//! 1. [`input`]   check the deck exists and is a zip package, copy it to
//!    the output path
//! 2. [`extract`] pick a title per slide with a prioritised strategy list
//! 3. [`crate::prompts`] turn the title into an image prompt
//! 4. [`fetch`]   call the [`service::ImageService`] with retry, download
//!    and validate the image; the only stage with network I/O
//! 5. [`mutate`]  swap the slide's generated picture and save the deck

pub mod extract;
pub mod fetch;
pub mod input;
pub mod mutate;
pub mod service;
