//! Title extraction: pick the text that best represents each slide.
//!
//! Decks in the wild rarely use title placeholders consistently, so the
//! extractor tries a prioritised list of strategies and keeps the first
//! non-empty answer:
//!
//! 1. `title_shape`: the slide's title placeholder (`title` or `ctrTitle`)
//! 2. `title_placeholder`: any placeholder whose role is exactly `title`
//! 3. `largest_font`: the shape holding the largest explicit font run,
//!    when that run is bigger than [`TitleRules::min_font_pt`]
//! 4. `short_text`: the first shape whose text is shorter than
//!    [`TitleRules::max_fallback_chars`]
//!
//! Slides where every strategy fails get a synthetic `"Slide N"` title and
//! `has_title = false`; the orchestrator skips them. A slide whose XML
//! cannot be read is untitled too and carries a [`SlideError::Extraction`].

use crate::config::TitleRules;
use crate::deck::{Deck, Shape};
use crate::error::SlideError;
use crate::output::SlideInfo;
use tracing::{debug, warn};

/// A named title strategy.
type Strategy = fn(&[Shape], &TitleRules) -> Option<String>;

/// Strategies in priority order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("title_shape", title_shape),
    ("title_placeholder", title_placeholder),
    ("largest_font", largest_font),
    ("short_text", short_text),
];

/// Trimmed text of a shape, `None` when blank or without a text frame.
fn shape_text(shape: &Shape) -> Option<String> {
    if !shape.has_text_frame() {
        return None;
    }
    let text = shape.text();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn title_shape(shapes: &[Shape], _rules: &TitleRules) -> Option<String> {
    shapes
        .iter()
        .find(|s| matches!(s.placeholder_type(), Some("title" | "ctrTitle")))
        .and_then(shape_text)
}

fn title_placeholder(shapes: &[Shape], _rules: &TitleRules) -> Option<String> {
    shapes
        .iter()
        .filter(|s| s.placeholder_type() == Some("title"))
        .find_map(shape_text)
}

fn largest_font(shapes: &[Shape], rules: &TitleRules) -> Option<String> {
    let mut best: Option<(f32, &Shape)> = None;
    for shape in shapes.iter().filter(|s| s.has_text_frame()) {
        for size in shape.runs().filter_map(|r| r.size_pt) {
            // Strictly greater: on ties the first shape seen keeps the lead.
            if best.is_none_or(|(max, _)| size > max) {
                best = Some((size, shape));
            }
        }
    }
    let (size, shape) = best?;
    if size > rules.min_font_pt {
        shape_text(shape)
    } else {
        None
    }
}

fn short_text(shapes: &[Shape], rules: &TitleRules) -> Option<String> {
    shapes
        .iter()
        .filter_map(shape_text)
        .find(|t| t.chars().count() < rules.max_fallback_chars)
}

/// Run the strategies over one slide's shapes.
///
/// Returns the title and the name of the strategy that found it.
pub fn extract_title(shapes: &[Shape], rules: &TitleRules) -> Option<(String, &'static str)> {
    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(shapes, rules).map(|t| (t, *name)))
}

/// Extract a [`SlideInfo`] for every slide of the deck.
///
/// A slide whose XML cannot be read is logged and treated as untitled; it
/// never stops the other slides from being extracted.
pub fn extract_slides(deck: &Deck, rules: &TitleRules) -> Vec<SlideInfo> {
    (0..deck.slide_count())
        .map(|index| {
            let number = index + 1;
            let (title, extraction_error) = match deck.shapes(index) {
                Ok(shapes) => (extract_title(&shapes, rules), None),
                Err(e) => {
                    let error = SlideError::Extraction {
                        slide: number,
                        detail: e.to_string(),
                    };
                    warn!("{}", error);
                    (None, Some(error))
                }
            };
            let layout_name = deck
                .layout_name(index)
                .ok()
                .flatten()
                .unwrap_or_else(|| "Unknown".to_string());

            match title {
                Some((title, method)) => {
                    debug!("Slide {}: title '{}' via {}", number, title, method);
                    SlideInfo {
                        index,
                        title,
                        has_title: true,
                        layout_name,
                        extraction_error,
                    }
                }
                None => {
                    debug!("Slide {}: no title found", number);
                    SlideInfo {
                        index,
                        title: format!("Slide {number}"),
                        has_title: false,
                        layout_name,
                        extraction_error,
                    }
                }
            }
        })
        .collect()
}
