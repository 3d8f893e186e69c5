use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::store::{keys, PreferenceStore};

/// User-perceived characters, whitespace included.
pub fn character_count(text: &str) -> usize {
    text.graphemes(true).count()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Status bar label for `text`.
pub fn render(text: &str, show_character_count: bool) -> String {
    if show_character_count {
        format_count(character_count(text), "character", "characters")
    } else {
        format_count(word_count(text), "word", "words")
    }
}

/// Flips between character and word counts and returns the new label.
pub fn toggle(store: &PreferenceStore, text: &str) -> String {
    let show_character_count = !store.get(&keys::SHOW_CHARACTER_COUNT);
    if let Err(error) = store.set(&keys::SHOW_CHARACTER_COUNT, show_character_count) {
        warn!(%error, "count mode changed but not persisted");
    }
    render(text, show_character_count)
}
