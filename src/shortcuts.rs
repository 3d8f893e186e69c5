use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::store::{keys, PreferenceStore};

/// ⌃⌥⇧⌘X
pub const DEFAULT_TOGGLE_SHORTCUT: &str = "Cmd+Ctrl+Shift+Alt+X";

/// What the global hotkey does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShortcutBehavior {
    /// Hide when focused, otherwise bring to front and focus.
    #[default]
    FocusAndHide,
    /// Hide when visible, otherwise show.
    ShowAndHide,
}

impl ShortcutBehavior {
    pub fn display_name(self) -> &'static str {
        match self {
            ShortcutBehavior::FocusAndHide => "Focus or Hide Window",
            ShortcutBehavior::ShowAndHide => "Show or Hide Window",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortcutParseError {
    #[error("shortcut string is empty")]
    Empty,
    #[error("shortcut has no key, only modifiers")]
    MissingKey,
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

/// Commands available while the panel has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteCommand {
    NextNote,
    PreviousNote,
    /// 1-based, as on the number row.
    SelectNote(usize),
    ToggleStatusMode,
    SaveNote,
    HideWindow,
}

// First entry for a code is its display name; later ones are accepted aliases.
const KEY_NAMES: &[(&str, Code)] = &[
    ("A", Code::KeyA),
    ("B", Code::KeyB),
    ("C", Code::KeyC),
    ("D", Code::KeyD),
    ("E", Code::KeyE),
    ("F", Code::KeyF),
    ("G", Code::KeyG),
    ("H", Code::KeyH),
    ("I", Code::KeyI),
    ("J", Code::KeyJ),
    ("K", Code::KeyK),
    ("L", Code::KeyL),
    ("M", Code::KeyM),
    ("N", Code::KeyN),
    ("O", Code::KeyO),
    ("P", Code::KeyP),
    ("Q", Code::KeyQ),
    ("R", Code::KeyR),
    ("S", Code::KeyS),
    ("T", Code::KeyT),
    ("U", Code::KeyU),
    ("V", Code::KeyV),
    ("W", Code::KeyW),
    ("X", Code::KeyX),
    ("Y", Code::KeyY),
    ("Z", Code::KeyZ),
    ("0", Code::Digit0),
    ("1", Code::Digit1),
    ("2", Code::Digit2),
    ("3", Code::Digit3),
    ("4", Code::Digit4),
    ("5", Code::Digit5),
    ("6", Code::Digit6),
    ("7", Code::Digit7),
    ("8", Code::Digit8),
    ("9", Code::Digit9),
    ("F1", Code::F1),
    ("F2", Code::F2),
    ("F3", Code::F3),
    ("F4", Code::F4),
    ("F5", Code::F5),
    ("F6", Code::F6),
    ("F7", Code::F7),
    ("F8", Code::F8),
    ("F9", Code::F9),
    ("F10", Code::F10),
    ("F11", Code::F11),
    ("F12", Code::F12),
    ("Space", Code::Space),
    ("Enter", Code::Enter),
    ("Tab", Code::Tab),
    ("Backspace", Code::Backspace),
    ("Escape", Code::Escape),
    ("Esc", Code::Escape),
    ("Up", Code::ArrowUp),
    ("ArrowUp", Code::ArrowUp),
    ("Down", Code::ArrowDown),
    ("ArrowDown", Code::ArrowDown),
    ("Left", Code::ArrowLeft),
    ("ArrowLeft", Code::ArrowLeft),
    ("Right", Code::ArrowRight),
    ("ArrowRight", Code::ArrowRight),
    ("Comma", Code::Comma),
    (",", Code::Comma),
    ("Period", Code::Period),
    (".", Code::Period),
    ("Slash", Code::Slash),
    ("BracketLeft", Code::BracketLeft),
    ("[", Code::BracketLeft),
    ("BracketRight", Code::BracketRight),
    ("]", Code::BracketRight),
    ("Semicolon", Code::Semicolon),
    ("Quote", Code::Quote),
    ("Minus", Code::Minus),
    ("Equal", Code::Equal),
];

fn code_for(name: &str) -> Option<Code> {
    let name = name
        .strip_prefix("Key")
        .or_else(|| name.strip_prefix("Digit"))
        .filter(|rest| rest.chars().count() == 1)
        .unwrap_or(name);
    KEY_NAMES
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

fn name_for(code: Code) -> &'static str {
    KEY_NAMES
        .iter()
        .find(|(_, candidate)| *candidate == code)
        .map_or("Unknown", |(name, _)| *name)
}

fn modifier_for(name: &str) -> Option<Modifiers> {
    match name.to_lowercase().as_str() {
        "commandorcontrol" | "cmdorctrl" | "cmd" | "command" | "meta" | "super" => {
            Some(Modifiers::SUPER)
        }
        "ctrl" | "control" => Some(Modifiers::CONTROL),
        "shift" => Some(Modifiers::SHIFT),
        "alt" | "option" => Some(Modifiers::ALT),
        _ => None,
    }
}

/// Parses strings such as `"Cmd+Shift+X"` or `"CommandOrControl+BracketRight"`.
pub fn parse_shortcut(shortcut: &str) -> Result<HotKey, ShortcutParseError> {
    let parts: Vec<&str> = shortcut
        .split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    let Some((key, modifier_parts)) = parts.split_last() else {
        return Err(ShortcutParseError::Empty);
    };

    let mut modifiers = Modifiers::empty();
    for part in modifier_parts {
        modifiers |= modifier_for(part)
            .ok_or_else(|| ShortcutParseError::UnknownModifier(part.to_string()))?;
    }

    match code_for(key) {
        Some(code) => Ok(HotKey::new(Some(modifiers), code)),
        None if modifier_for(key).is_some() => Err(ShortcutParseError::MissingKey),
        None => Err(ShortcutParseError::UnknownKey(key.to_string())),
    }
}

pub fn shortcut_to_string(shortcut: &HotKey) -> String {
    let mut parts = Vec::new();
    let mods = shortcut.mods;

    if mods.contains(Modifiers::SUPER) {
        parts.push("Cmd");
    }
    if mods.contains(Modifiers::CONTROL) {
        parts.push("Ctrl");
    }
    if mods.contains(Modifiers::SHIFT) {
        parts.push("Shift");
    }
    if mods.contains(Modifiers::ALT) {
        parts.push("Alt");
    }
    parts.push(name_for(shortcut.key));

    parts.join("+")
}

fn default_toggle_hotkey() -> HotKey {
    HotKey::new(
        Some(Modifiers::SUPER | Modifiers::CONTROL | Modifiers::SHIFT | Modifiers::ALT),
        Code::KeyX,
    )
}

/// The configured show/hide hotkey, or the default when the stored string does not parse.
pub fn toggle_shortcut(store: &PreferenceStore) -> HotKey {
    let configured = store.get(&keys::TOGGLE_SHORTCUT);
    parse_shortcut(&configured).unwrap_or_else(|error| {
        warn!(shortcut = %configured, %error, "invalid toggle shortcut, using default");
        default_toggle_hotkey()
    })
}

pub fn same_chord(a: &HotKey, b: &HotKey) -> bool {
    a.mods == b.mods && a.key == b.key
}

/// Maps an in-panel key chord to a note command.
pub fn command_for(chord: &HotKey) -> Option<NoteCommand> {
    if chord.mods == Modifiers::SUPER {
        return match chord.key {
            Code::BracketRight => Some(NoteCommand::NextNote),
            Code::BracketLeft => Some(NoteCommand::PreviousNote),
            Code::Digit1 => Some(NoteCommand::SelectNote(1)),
            Code::Digit2 => Some(NoteCommand::SelectNote(2)),
            Code::Digit3 => Some(NoteCommand::SelectNote(3)),
            Code::Digit4 => Some(NoteCommand::SelectNote(4)),
            Code::Digit5 => Some(NoteCommand::SelectNote(5)),
            Code::KeyW => Some(NoteCommand::HideWindow),
            _ => None,
        };
    }
    if chord.mods.is_empty() && chord.key == Code::Escape {
        return Some(NoteCommand::HideWindow);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    #[test]
    fn parses_modifiers_and_key() {
        let shortcut = parse_shortcut("Cmd+Shift+X").expect("valid shortcut");
        assert_eq!(shortcut.mods, Modifiers::SUPER | Modifiers::SHIFT);
        assert_eq!(shortcut.key, Code::KeyX);
    }

    #[test]
    fn accepts_long_key_names_and_aliases() {
        let shortcut = parse_shortcut("commandorcontrol+KeyN").expect("valid shortcut");
        assert_eq!(shortcut.key, Code::KeyN);
        assert_eq!(parse_shortcut("Cmd+]").map(|s| s.key), Ok(Code::BracketRight));
        assert_eq!(parse_shortcut("Option+Digit3").map(|s| s.key), Ok(Code::Digit3));
    }

    #[test]
    fn reports_parse_errors() {
        assert_eq!(parse_shortcut(""), Err(ShortcutParseError::Empty));
        assert_eq!(parse_shortcut("Cmd+Shift"), Err(ShortcutParseError::MissingKey));
        assert_eq!(
            parse_shortcut("Hyper+X"),
            Err(ShortcutParseError::UnknownModifier("Hyper".to_string()))
        );
        assert_eq!(
            parse_shortcut("Cmd+Pause"),
            Err(ShortcutParseError::UnknownKey("Pause".to_string()))
        );
    }

    #[test]
    fn formats_back_to_canonical_string() {
        let shortcut = parse_shortcut("shift+cmd+esc").expect("valid shortcut");
        assert_eq!(shortcut_to_string(&shortcut), "Cmd+Shift+Escape");
    }

    #[test]
    fn default_toggle_shortcut_string_parses_to_default_hotkey() {
        let parsed = parse_shortcut(DEFAULT_TOGGLE_SHORTCUT).expect("valid shortcut");
        assert!(same_chord(&parsed, &default_toggle_hotkey()));
    }

    #[test]
    fn invalid_stored_toggle_shortcut_falls_back() {
        let store = PreferenceStore::open(MemoryBackend::new());
        store
            .set(&keys::TOGGLE_SHORTCUT, "Cmd+Nope".to_string())
            .expect("set");

        assert!(same_chord(&toggle_shortcut(&store), &default_toggle_hotkey()));
    }

    #[test]
    fn maps_panel_chords_to_commands() {
        let chord = |s: &str| parse_shortcut(s).expect("valid shortcut");

        assert_eq!(command_for(&chord("Cmd+]")), Some(NoteCommand::NextNote));
        assert_eq!(command_for(&chord("Cmd+[")), Some(NoteCommand::PreviousNote));
        assert_eq!(command_for(&chord("Cmd+4")), Some(NoteCommand::SelectNote(4)));
        assert_eq!(command_for(&chord("Cmd+6")), None);
        assert_eq!(command_for(&chord("Escape")), Some(NoteCommand::HideWindow));
        assert_eq!(command_for(&chord("Cmd+Shift+]")), None);
    }
}
