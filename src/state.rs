use crate::shortcuts::ShortcutBehavior;
use crate::store::keys::Rgba;

/// Everything the renderer needs to draw the panel chrome.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromeState {
    pub title: String,
    pub title_visible: bool,
    pub status_text: String,
    pub title_bar_opacity: f64,
    pub status_bar_opacity: f64,
    pub title_bar_reserved: bool,
    pub status_bar_reserved: bool,
    pub buttons: WindowButtons,
    pub background: Rgba,
    pub padding: f64,
    pub presence: WindowPresence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowButtons {
    pub close: bool,
    pub minimize: bool,
    pub zoom: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPresence {
    #[default]
    Hidden,
    Visible,
    Focused,
}

/// What the window layer should do in response to the global hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCommand {
    Hide,
    ShowAndFocus,
}

impl WindowPresence {
    /// Applies one press of the global hotkey.
    pub fn toggle(self, behavior: ShortcutBehavior) -> (WindowPresence, WindowCommand) {
        let hide = match behavior {
            ShortcutBehavior::FocusAndHide => self == WindowPresence::Focused,
            ShortcutBehavior::ShowAndHide => self != WindowPresence::Hidden,
        };
        if hide {
            (WindowPresence::Hidden, WindowCommand::Hide)
        } else {
            (WindowPresence::Focused, WindowCommand::ShowAndFocus)
        }
    }
}
