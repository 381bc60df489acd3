//! Prompt composition: slide title → text-to-image prompt.
//!
//! Titles alone ("Psaume 23") make poor image prompts. The composer enriches
//! them with a descriptive phrase picked from a keyword table, then adds a
//! fixed quality suffix. The function is pure: the same title and table
//! always yield the same prompt, which keeps reruns reproducible and lets the
//! tests pin exact strings.
//!
//! The default table targets liturgical decks (French mass booklets), which
//! is what the tool was first written for. Callers with other decks swap in
//! their own [`PromptTable`] via [`crate::config::GeneratorConfigBuilder::prompts`].

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default keyword → phrase table, scanned in order; first hit wins.
pub const DEFAULT_KEYWORDS: &[(&str, &str)] = &[
    ("messe", "catholic mass ceremony, church interior, altar"),
    ("évangile", "gospel book, bible, religious scripture, holy light"),
    ("lecture", "bible reading, scripture, religious text, church lectern"),
    ("psaume", "psalm, religious music, church choir, spiritual"),
    ("communion", "holy communion, eucharist, chalice, bread and wine"),
    ("chant", "church choir, religious music, hymn, spiritual singing"),
    ("prière", "prayer, hands in prayer, spiritual meditation, church"),
    ("liturgie", "liturgical ceremony, church service, religious ritual"),
    ("célébration", "religious celebration, church ceremony, festive"),
    ("sanctus", "holy, sacred, church bells, divine light"),
    ("gloria", "glory, heavenly light, angels, divine radiance"),
    ("kyrie", "mercy, compassion, gentle light, peaceful"),
    ("offertoire", "offering, gifts, altar, religious ceremony"),
    ("entrée", "church entrance, procession, welcoming, gathering"),
    ("sortie", "church exit, blessing, peaceful departure"),
    ("noël", "christmas, nativity, star, peaceful night"),
    ("pâques", "easter, resurrection, sunrise, hope, new life"),
    ("avent", "advent, waiting, candles, purple, preparation"),
];

/// Words that mark a title as on-theme even without a table keyword.
pub const DEFAULT_SIGNAL_WORDS: &[&str] = &["dieu", "seigneur", "christ", "jésus", "marie"];

/// Appended when only a signal word matched.
pub const DEFAULT_THEMATIC_PHRASE: &str = "religious art, spiritual, peaceful, divine light";

/// Appended when nothing matched.
pub const DEFAULT_NEUTRAL_PHRASE: &str = "peaceful, serene, beautiful, artistic";

/// Appended to every prompt.
pub const DEFAULT_QUALITY_SUFFIX: &str =
    "high quality, professional, clean, beautiful lighting, artistic composition";

/// One row of the keyword table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordPhrase {
    /// Lower-case keyword matched by substring containment.
    pub keyword: String,
    /// Phrase appended to the title on a match.
    pub phrase: String,
}

/// The full enrichment table used by [`compose_prompt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTable {
    /// Ordered keyword table; the first matching row wins.
    pub keywords: Vec<KeywordPhrase>,
    /// Secondary on-theme words.
    pub signal_words: Vec<String>,
    /// Phrase for titles that only hit a signal word.
    pub thematic_phrase: String,
    /// Phrase for titles that hit nothing.
    pub neutral_phrase: String,
    /// Suffix appended to every prompt.
    pub quality_suffix: String,
}

impl Default for PromptTable {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS
                .iter()
                .map(|(k, p)| KeywordPhrase {
                    keyword: (*k).to_string(),
                    phrase: (*p).to_string(),
                })
                .collect(),
            signal_words: DEFAULT_SIGNAL_WORDS.iter().map(|w| (*w).to_string()).collect(),
            thematic_phrase: DEFAULT_THEMATIC_PHRASE.to_string(),
            neutral_phrase: DEFAULT_NEUTRAL_PHRASE.to_string(),
            quality_suffix: DEFAULT_QUALITY_SUFFIX.to_string(),
        }
    }
}

impl PromptTable {
    /// Pick the enrichment phrase for an already lower-cased title.
    fn phrase_for(&self, lowered: &str) -> &str {
        if let Some(row) = self
            .keywords
            .iter()
            .find(|row| lowered.contains(row.keyword.as_str()))
        {
            return &row.phrase;
        }
        if self
            .signal_words
            .iter()
            .any(|w| lowered.contains(w.as_str()))
        {
            return &self.thematic_phrase;
        }
        &self.neutral_phrase
    }
}

/// Build the image prompt for a slide title.
///
/// `slide_index` is 0-based and only used for logging.
///
/// ```rust
/// use pptx_illustrator::prompts::{compose_prompt, PromptTable};
///
/// let p = compose_prompt("Messe du dimanche", 0, &PromptTable::default());
/// assert!(p.starts_with("Messe du dimanche, catholic mass ceremony"));
/// ```
pub fn compose_prompt(title: &str, slide_index: usize, table: &PromptTable) -> String {
    let title = title.trim();
    let lowered = title.to_lowercase();
    let phrase = table.phrase_for(&lowered);
    let prompt = format!("{title}, {phrase}, {}", table.quality_suffix);
    debug!("Slide {}: prompt '{}'", slide_index + 1, prompt);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PromptTable {
        PromptTable::default()
    }

    #[test]
    fn same_title_same_prompt() {
        let t = table();
        for title in ["Messe", "Psaume 23", "Annonces", "", "Gloire à Dieu"] {
            assert_eq!(compose_prompt(title, 0, &t), compose_prompt(title, 7, &t));
        }
    }

    #[test]
    fn keyword_phrase_beats_fallbacks() {
        let t = table();
        for row in &t.keywords {
            let title = format!("Le {} du jour", row.keyword.to_uppercase());
            let p = compose_prompt(&title, 0, &t);
            assert!(p.contains(&row.phrase), "{title} → {p}");
            assert!(!p.contains(DEFAULT_NEUTRAL_PHRASE), "{title} → {p}");
            assert!(!p.contains(DEFAULT_THEMATIC_PHRASE), "{title} → {p}");
        }
    }

    #[test]
    fn first_keyword_in_table_order_wins() {
        // Both "messe" and "chant" appear; "messe" comes first in the table.
        let p = compose_prompt("Chant de la messe", 0, &table());
        assert!(p.contains("catholic mass ceremony"));
        assert!(!p.contains("spiritual singing"));
    }

    #[test]
    fn signal_word_gives_thematic_phrase() {
        let p = compose_prompt("Louez le Seigneur", 0, &table());
        assert_eq!(
            p,
            format!("Louez le Seigneur, {DEFAULT_THEMATIC_PHRASE}, {DEFAULT_QUALITY_SUFFIX}")
        );
    }

    #[test]
    fn unmatched_title_gives_neutral_phrase() {
        let p = compose_prompt("  Annonces paroissiales ", 0, &table());
        assert_eq!(
            p,
            format!("Annonces paroissiales, {DEFAULT_NEUTRAL_PHRASE}, {DEFAULT_QUALITY_SUFFIX}")
        );
    }

    #[test]
    fn accented_capital_matches_lowercase_keyword() {
        let p = compose_prompt("Évangile selon saint Jean", 2, &table());
        assert!(p.starts_with("Évangile selon saint Jean, gospel book"));
        assert!(p.ends_with(DEFAULT_QUALITY_SUFFIX));
    }

    #[test]
    fn custom_table_is_honoured() {
        let t = PromptTable {
            keywords: vec![KeywordPhrase {
                keyword: "rust".into(),
                phrase: "a friendly crab".into(),
            }],
            signal_words: vec![],
            thematic_phrase: "x".into(),
            neutral_phrase: "plain".into(),
            quality_suffix: "4k".into(),
        };
        assert_eq!(compose_prompt("Why Rust", 0, &t), "Why Rust, a friendly crab, 4k");
        assert_eq!(compose_prompt("Why Go", 0, &t), "Why Go, plain, 4k");
    }
}
