use serde::{Deserialize, Serialize};

use super::Key;
use crate::notes::NOTE_COUNT;
use crate::shortcuts::{ShortcutBehavior, DEFAULT_TOGGLE_SHORTCUT};
use crate::visibility::BarBehavior;

/// Panel background color. Channels are 0-255, alpha is 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: f64,
}

impl Rgba {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::new(36, 36, 36, 0.6)
    }
}

pub const PADDING: Key<f64> = Key::new("padding", default_padding).sanitized(non_negative);
pub const COLOR: Key<Rgba> = Key::new("color", Rgba::default).sanitized(clamp_alpha);
pub const SHORTCUT_BEHAVIOR: Key<ShortcutBehavior> =
    Key::new("shortcutBehavior", ShortcutBehavior::default);
pub const TOGGLE_SHORTCUT: Key<String> = Key::new("toggleShortcut", default_toggle_shortcut);
pub const SHOW_CHARACTER_COUNT: Key<bool> = Key::new("showCharacterCount", default_true);
pub const SHOW_CLOSE_BUTTON: Key<bool> = Key::new("showCloseButton", default_true);
pub const SHOW_MINIMIZE_BUTTON: Key<bool> = Key::new("showMinimizeButton", default_true);
pub const SHOW_ZOOM_BUTTON: Key<bool> = Key::new("showZoomButton", default_true);
pub const SHOW_TITLE: Key<bool> = Key::new("showTitle", default_true);
pub const TITLE_BAR_BEHAVIOR: Key<BarBehavior> =
    Key::new("titleBarBehavior", BarBehavior::default);
pub const STATUS_BAR_BEHAVIOR: Key<BarBehavior> =
    Key::new("statusBarBehavior", BarBehavior::default);
pub const NOTES: Key<Vec<String>> = Key::new("notes", empty_notes).sanitized(five_slots);
pub const CURRENT_NOTE_INDEX: Key<usize> =
    Key::new("currentNoteIndex", default_index).sanitized(index_in_range);
/// Notes that did not fit into the five slots, oldest first.
pub const ARCHIVED_NOTES: Key<Vec<String>> = Key::new("archivedNotes", Vec::new);

fn default_true() -> bool {
    true
}

fn default_padding() -> f64 {
    20.0
}

fn default_index() -> usize {
    0
}

fn default_toggle_shortcut() -> String {
    DEFAULT_TOGGLE_SHORTCUT.to_string()
}

fn empty_notes() -> Vec<String> {
    vec![String::new(); NOTE_COUNT]
}

fn non_negative(padding: f64) -> Option<f64> {
    (padding.is_finite() && padding >= 0.0).then_some(padding)
}

fn clamp_alpha(color: Rgba) -> Option<Rgba> {
    if !color.alpha.is_finite() {
        return None;
    }
    Some(Rgba {
        alpha: color.alpha.clamp(0.0, 1.0),
        ..color
    })
}

// The store archives anything past the last slot before it gets here.
fn five_slots(mut notes: Vec<String>) -> Option<Vec<String>> {
    notes.resize(NOTE_COUNT, String::new());
    Some(notes)
}

fn index_in_range(index: usize) -> Option<usize> {
    (index < NOTE_COUNT).then_some(index)
}
