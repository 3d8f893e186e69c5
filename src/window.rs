//! The note panel controller.
//!
//! Owns the live buffer and the chrome snapshot, listens to every preference that
//! affects the panel and exposes the note operations used by shortcuts and menus.
//!
//! Preference callbacks arrive synchronously, sometimes while the controller is in
//! the middle of its own write (a switch persists `notes` and `currentNoteIndex`).
//! Such updates are queued and applied once the running operation returns, and the
//! renderer only hears about the final chrome state.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

use crate::autosave::AutosaveTrigger;
use crate::bus::{ChangeBus, Subscription};
use crate::error::StoreError;
use crate::notes::{NoteCollection, NOTE_COUNT};
use crate::shortcuts::NoteCommand;
use crate::state::{ChromeState, WindowButtons, WindowCommand, WindowPresence};
use crate::status;
use crate::store::keys::{self, Rgba};
use crate::store::{Change, Key, Preference, PreferenceStore};
use crate::visibility::{BarBehavior, ChromeRegion, HoverState, VisibilityState};

const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\u{0B}', '\u{0C}', '\u{85}', '\u{2028}', '\u{2029}',
];

/// `"[2] Hello"` for `"Hello\nworld"` at slot 2, `"[0] Note 1"` for an empty slot 0.
pub fn window_title(text: &str, index: usize) -> String {
    let first_line = text.split(LINE_BREAKS).next().unwrap_or_default();
    if first_line.is_empty() {
        format!("[{}] Note {}", index, index + 1)
    } else {
        format!("[{}] {}", index, first_line)
    }
}

/// Published after every edit of the live buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChanged {
    pub index: usize,
    pub characters: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutosaveStatus {
    pub pending_changes: bool,
    pub last_saved_at: Option<String>,
    pub last_trigger: Option<AutosaveTrigger>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum ChromeUpdate {
    Color(Rgba),
    Padding(f64),
    CloseButton(bool),
    MinimizeButton(bool),
    ZoomButton(bool),
    ShowTitle(bool),
    TitleBar(BarBehavior),
    StatusBar(BarBehavior),
    CountMode(bool),
    NoteIndex(usize),
    Notes(Vec<String>),
}

struct WindowInner {
    store: Rc<PreferenceStore>,
    notes: NoteCollection,
    buffer: String,
    /// Text of the current slot as last loaded or saved.
    saved: String,
    visibility: VisibilityState,
    show_character_count: bool,
    chrome: ChromeState,
    autosave: AutosaveStatus,
}

impl WindowInner {
    fn new(store: Rc<PreferenceStore>) -> Self {
        let notes = NoteCollection::new(store.clone());
        let buffer = notes.load_current();
        let visibility = VisibilityState::new(
            store.get(&keys::TITLE_BAR_BEHAVIOR),
            store.get(&keys::STATUS_BAR_BEHAVIOR),
        );
        let show_character_count = store.get(&keys::SHOW_CHARACTER_COUNT);
        let chrome = ChromeState {
            title: window_title(&buffer, notes.current_index()),
            title_visible: store.get(&keys::SHOW_TITLE),
            status_text: status::render(&buffer, show_character_count),
            title_bar_opacity: visibility.opacity(ChromeRegion::TitleBar),
            status_bar_opacity: visibility.opacity(ChromeRegion::StatusBar),
            title_bar_reserved: visibility.reserves_space(ChromeRegion::TitleBar),
            status_bar_reserved: visibility.reserves_space(ChromeRegion::StatusBar),
            buttons: WindowButtons {
                close: store.get(&keys::SHOW_CLOSE_BUTTON),
                minimize: store.get(&keys::SHOW_MINIMIZE_BUTTON),
                zoom: store.get(&keys::SHOW_ZOOM_BUTTON),
            },
            background: store.get(&keys::COLOR),
            padding: store.get(&keys::PADDING),
            presence: WindowPresence::default(),
        };

        Self {
            store,
            saved: buffer.clone(),
            notes,
            buffer,
            visibility,
            show_character_count,
            chrome,
            autosave: AutosaveStatus::default(),
        }
    }

    fn apply(&mut self, update: ChromeUpdate) {
        match update {
            ChromeUpdate::Color(color) => self.chrome.background = color,
            ChromeUpdate::Padding(padding) => self.chrome.padding = padding,
            ChromeUpdate::CloseButton(shown) => self.chrome.buttons.close = shown,
            ChromeUpdate::MinimizeButton(shown) => self.chrome.buttons.minimize = shown,
            ChromeUpdate::ZoomButton(shown) => self.chrome.buttons.zoom = shown,
            ChromeUpdate::ShowTitle(shown) => self.chrome.title_visible = shown,
            ChromeUpdate::TitleBar(behavior) => {
                self.visibility.set_behavior(ChromeRegion::TitleBar, behavior);
                self.refresh_visibility();
            }
            ChromeUpdate::StatusBar(behavior) => {
                self.visibility.set_behavior(ChromeRegion::StatusBar, behavior);
                self.refresh_visibility();
            }
            ChromeUpdate::CountMode(show_character_count) => {
                self.show_character_count = show_character_count;
                self.refresh_text();
            }
            ChromeUpdate::NoteIndex(index) => {
                if self.notes.follow_index(&mut self.buffer, index) {
                    self.after_load();
                }
            }
            ChromeUpdate::Notes(notes) => self.reconcile(notes),
        }
    }

    /// Someone else rewrote the slots. A clean buffer follows the store, an
    /// edited one keeps its text and overwrites the slot on the next save.
    fn reconcile(&mut self, notes: Vec<String>) {
        let stored = notes
            .get(self.notes.current_index())
            .cloned()
            .unwrap_or_default();
        if stored == self.saved {
            return;
        }

        if self.buffer == self.saved {
            self.buffer = stored.clone();
            self.refresh_text();
            debug!(index = self.notes.current_index(), "reloaded note changed elsewhere");
        } else {
            info!(
                index = self.notes.current_index(),
                "note changed elsewhere, keeping unsaved edits"
            );
        }
        self.saved = stored;
    }

    fn after_load(&mut self) {
        self.saved = self.buffer.clone();
        self.refresh_text();
    }

    fn refresh_text(&mut self) {
        self.chrome.title = window_title(&self.buffer, self.notes.current_index());
        self.chrome.status_text = status::render(&self.buffer, self.show_character_count);
    }

    fn refresh_visibility(&mut self) {
        self.chrome.title_bar_opacity = self.visibility.opacity(ChromeRegion::TitleBar);
        self.chrome.status_bar_opacity = self.visibility.opacity(ChromeRegion::StatusBar);
        self.chrome.title_bar_reserved = self.visibility.reserves_space(ChromeRegion::TitleBar);
        self.chrome.status_bar_reserved = self.visibility.reserves_space(ChromeRegion::StatusBar);
    }

    fn save(&mut self, trigger: AutosaveTrigger) -> Result<(), StoreError> {
        let result = self.notes.save_current(&self.buffer).and_then(|()| {
            if self.store.is_dirty() {
                self.store.flush()
            } else {
                Ok(())
            }
        });

        self.autosave.last_trigger = Some(trigger);
        match &result {
            Ok(()) => {
                self.saved = self.buffer.clone();
                self.autosave.last_saved_at = Some(chrono::Local::now().to_rfc3339());
                self.autosave.last_error = None;
                debug!(
                    trigger = trigger.label(),
                    index = self.notes.current_index(),
                    "note saved"
                );
            }
            Err(error) => {
                self.autosave.last_error = Some(error.to_string());
                warn!(trigger = trigger.label(), %error, "note save failed, will retry");
            }
        }
        result
    }

    fn switch_to(&mut self, index: usize) -> bool {
        if index == self.notes.current_index() || index >= NOTE_COUNT {
            return false;
        }
        // a failed save still leaves the text in the store's memory
        let _ = self.save(AutosaveTrigger::NoteSwitch);
        if !self.notes.switch_to(&mut self.buffer, index) {
            return false;
        }
        self.after_load();
        true
    }

    fn autosave_status(&self) -> AutosaveStatus {
        AutosaveStatus {
            pending_changes: self.buffer != self.saved || self.store.is_dirty(),
            ..self.autosave.clone()
        }
    }
}

struct Shared {
    inner: RefCell<WindowInner>,
    deferred: RefCell<VecDeque<ChromeUpdate>>,
    published: RefCell<ChromeState>,
    chrome_changes: ChangeBus<ChromeState>,
    text_changes: ChangeBus<TextChanged>,
}

impl Shared {
    fn apply(&self, update: ChromeUpdate) {
        match self.inner.try_borrow_mut() {
            Ok(mut inner) => inner.apply(update),
            Err(_) => {
                self.deferred.borrow_mut().push_back(update);
                return;
            }
        }
        self.settle();
    }

    fn with_inner<R>(&self, operation: impl FnOnce(&mut WindowInner) -> R) -> Option<R> {
        let result = match self.inner.try_borrow_mut() {
            Ok(mut inner) => Some(operation(&mut inner)),
            Err(_) => {
                warn!("note window is busy, dropping nested request");
                None
            }
        };
        self.settle();
        result
    }

    /// Applies queued updates and publishes the chrome once if it changed.
    fn settle(&self) {
        let chrome = {
            let Ok(mut inner) = self.inner.try_borrow_mut() else {
                return;
            };
            loop {
                let next = self.deferred.borrow_mut().pop_front();
                let Some(update) = next else { break };
                inner.apply(update);
            }
            inner.chrome.clone()
        };

        if *self.published.borrow() == chrome {
            return;
        }
        *self.published.borrow_mut() = chrome.clone();
        self.chrome_changes.publish(chrome);
    }
}

fn watch<T: Preference>(
    store: &PreferenceStore,
    shared: &Rc<Shared>,
    key: &Key<T>,
    update: fn(T) -> ChromeUpdate,
) -> Subscription {
    let shared: Weak<Shared> = Rc::downgrade(shared);
    store.observe(key, move |change: &Change<T>| {
        if let Some(shared) = shared.upgrade() {
            shared.apply(update(change.new.clone()));
        }
    })
}

pub struct NotesWindow {
    store: Rc<PreferenceStore>,
    shared: Rc<Shared>,
    _subscriptions: Vec<Subscription>,
}

impl NotesWindow {
    pub fn new(store: Rc<PreferenceStore>) -> Self {
        let inner = WindowInner::new(store.clone());
        let shared = Rc::new(Shared {
            published: RefCell::new(inner.chrome.clone()),
            inner: RefCell::new(inner),
            deferred: RefCell::new(VecDeque::new()),
            chrome_changes: ChangeBus::new(),
            text_changes: ChangeBus::new(),
        });

        let subscriptions = vec![
            watch(&store, &shared, &keys::COLOR, ChromeUpdate::Color),
            watch(&store, &shared, &keys::PADDING, ChromeUpdate::Padding),
            watch(&store, &shared, &keys::SHOW_CLOSE_BUTTON, ChromeUpdate::CloseButton),
            watch(&store, &shared, &keys::SHOW_MINIMIZE_BUTTON, ChromeUpdate::MinimizeButton),
            watch(&store, &shared, &keys::SHOW_ZOOM_BUTTON, ChromeUpdate::ZoomButton),
            watch(&store, &shared, &keys::SHOW_TITLE, ChromeUpdate::ShowTitle),
            watch(&store, &shared, &keys::TITLE_BAR_BEHAVIOR, ChromeUpdate::TitleBar),
            watch(&store, &shared, &keys::STATUS_BAR_BEHAVIOR, ChromeUpdate::StatusBar),
            watch(&store, &shared, &keys::SHOW_CHARACTER_COUNT, ChromeUpdate::CountMode),
            watch(&store, &shared, &keys::CURRENT_NOTE_INDEX, ChromeUpdate::NoteIndex),
            watch(&store, &shared, &keys::NOTES, ChromeUpdate::Notes),
        ];

        info!(
            index = shared.inner.borrow().notes.current_index(),
            "note window ready"
        );
        Self {
            store,
            shared,
            _subscriptions: subscriptions,
        }
    }

    pub fn store(&self) -> &Rc<PreferenceStore> {
        &self.store
    }

    pub fn chrome(&self) -> ChromeState {
        self.shared.inner.borrow().chrome.clone()
    }

    pub fn text(&self) -> String {
        self.shared.inner.borrow().buffer.clone()
    }

    pub fn current_index(&self) -> usize {
        self.shared.inner.borrow().notes.current_index()
    }

    pub fn on_chrome_changed(&self, callback: impl Fn(&ChromeState) + 'static) -> Subscription {
        self.shared.chrome_changes.subscribe(callback)
    }

    pub fn on_text_changed(&self, callback: impl Fn(&TextChanged) + 'static) -> Subscription {
        self.shared.text_changes.subscribe(callback)
    }

    /// Replaces the live buffer with what the user typed.
    pub fn edit(&self, text: &str) {
        let changed = self.shared.with_inner(|inner| {
            if inner.buffer == text {
                return None;
            }
            inner.buffer = text.to_string();
            inner.refresh_text();
            Some(TextChanged {
                index: inner.notes.current_index(),
                characters: status::character_count(&inner.buffer),
            })
        });

        if let Some(Some(event)) = changed {
            self.shared.text_changes.publish(event);
        }
    }

    /// Reloads the buffer from the current slot, discarding unsaved edits.
    pub fn load_current(&self) -> String {
        self.shared
            .with_inner(|inner| {
                inner.buffer = inner.notes.load_current();
                inner.after_load();
                inner.buffer.clone()
            })
            .unwrap_or_default()
    }

    pub fn set_hovering(&self, hovering: bool) {
        self.shared.with_inner(|inner| {
            if inner.visibility.set_hover(HoverState::from(hovering)) {
                inner.refresh_visibility();
            }
        });
    }

    /// Saves the buffer into the current slot, selects `index` and loads it.
    /// Returns false when nothing happened.
    pub fn switch_to_note(&self, index: usize) -> bool {
        self.shared
            .with_inner(|inner| inner.switch_to(index))
            .unwrap_or(false)
    }

    pub fn next_note(&self) -> bool {
        self.shared
            .with_inner(|inner| {
                let index = inner.notes.next_index();
                inner.switch_to(index)
            })
            .unwrap_or(false)
    }

    pub fn previous_note(&self) -> bool {
        self.shared
            .with_inner(|inner| {
                let index = inner.notes.previous_index();
                inner.switch_to(index)
            })
            .unwrap_or(false)
    }

    /// 1-based selection as on the number row.
    pub fn select_ordinal(&self, ordinal: usize) -> bool {
        match ordinal.checked_sub(1) {
            Some(index) => self.switch_to_note(index),
            None => false,
        }
    }

    /// Saves the live buffer into its slot. Fails with [`StoreError::Busy`] when
    /// called from inside another window operation, since nothing was written.
    pub fn save_current(&self, trigger: AutosaveTrigger) -> Result<(), StoreError> {
        self.shared
            .with_inner(|inner| inner.save(trigger))
            .unwrap_or(Err(StoreError::Busy))
    }

    /// Flips the status bar between character and word counts.
    pub fn toggle_status_mode(&self) -> String {
        let text = self.text();
        let label = status::toggle(&self.store, &text);
        self.shared.settle();
        label
    }

    /// Handles a press of the global hotkey.
    pub fn toggle_window_visibility(&self) -> WindowCommand {
        let behavior = self.store.get(&keys::SHORTCUT_BEHAVIOR);
        self.shared
            .with_inner(|inner| {
                let (presence, command) = inner.chrome.presence.toggle(behavior);
                inner.chrome.presence = presence;
                debug!(?behavior, ?presence, "toggled window visibility");
                command
            })
            .unwrap_or(WindowCommand::ShowAndFocus)
    }

    /// Called by the window layer when the panel is shown, focused or hidden.
    pub fn set_presence(&self, presence: WindowPresence) {
        self.shared.with_inner(|inner| inner.chrome.presence = presence);
    }

    pub fn hide(&self) -> WindowCommand {
        self.set_presence(WindowPresence::Hidden);
        WindowCommand::Hide
    }

    /// Runs an in-panel command and returns what the window layer should do, if anything.
    pub fn run_command(&self, command: NoteCommand) -> Option<WindowCommand> {
        match command {
            NoteCommand::NextNote => {
                self.next_note();
            }
            NoteCommand::PreviousNote => {
                self.previous_note();
            }
            NoteCommand::SelectNote(ordinal) => {
                self.select_ordinal(ordinal);
            }
            NoteCommand::ToggleStatusMode => {
                self.toggle_status_mode();
            }
            NoteCommand::SaveNote => {
                let _ = self.save_current(AutosaveTrigger::Manual);
            }
            NoteCommand::HideWindow => return Some(self.hide()),
        }
        None
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.shared.inner.borrow().autosave_status()
    }

    /// Final synchronous save before the process exits.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        let result = self.save_current(AutosaveTrigger::Shutdown);
        match &result {
            Ok(()) => info!("notes saved on shutdown"),
            Err(error) => warn!(%error, "notes could not be saved on shutdown"),
        }
        result
    }
}
