//! The UI-thread event loop.
//!
//! Edits, hover changes, hotkeys, menu picks and autosave ticks all arrive as
//! [`AppEvent`]s on one channel and are handled one at a time, so a tick can never
//! run in the middle of a note switch.

use global_hotkey::hotkey::HotKey;
use std::cell::RefCell;
use std::io;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::autosave::{AutosaveConfig, AutosaveScheduler, AutosaveTrigger};
use crate::bus::Subscription;
use crate::error::StoreError;
use crate::menu::{self, MenuAction};
use crate::shortcuts::{self, NoteCommand};
use crate::state::{WindowCommand, WindowPresence};
use crate::store::{keys, PreferenceStore};
use crate::window::NotesWindow;

#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Full new contents of the live buffer.
    TextEdited(String),
    /// A line typed at the end of the live buffer.
    Append(String),
    Hover(bool),
    Presence(WindowPresence),
    Command(NoteCommand),
    Shortcut(HotKey),
    ToggleWindow,
    Menu(String),
    Autosave(AutosaveTrigger),
    Quit,
}

/// The platform side: window management and the settings form.
pub trait Shell {
    fn apply_window(&mut self, command: WindowCommand);
    fn open_settings(&mut self);
}

pub struct App<S: Shell> {
    window: NotesWindow,
    shell: S,
    toggle_hotkey: Rc<RefCell<HotKey>>,
    events: Receiver<AppEvent>,
    sender: Sender<AppEvent>,
    scheduler: Option<AutosaveScheduler>,
    _subscriptions: Vec<Subscription>,
}

impl<S: Shell> App<S> {
    pub fn new(store: Rc<PreferenceStore>, shell: S, config: AutosaveConfig) -> io::Result<Self> {
        let (sender, events) = mpsc::channel();
        let window = NotesWindow::new(store.clone());

        let scheduler = {
            let sender = sender.clone();
            AutosaveScheduler::start(config, move |trigger| {
                sender.send(AppEvent::Autosave(trigger)).is_ok()
            })?
        };

        let edits = {
            let notifier = scheduler.edit_notifier();
            window.on_text_changed(move |_| notifier.note_edited())
        };

        let toggle_hotkey = Rc::new(RefCell::new(shortcuts::toggle_shortcut(&store)));
        let shortcut_changes = {
            let toggle_hotkey = toggle_hotkey.clone();
            let weak_store = Rc::downgrade(&store);
            store.observe(&keys::TOGGLE_SHORTCUT, move |_| {
                if let Some(store) = weak_store.upgrade() {
                    let hotkey = shortcuts::toggle_shortcut(&store);
                    info!(shortcut = %shortcuts::shortcut_to_string(&hotkey), "toggle shortcut changed");
                    *toggle_hotkey.borrow_mut() = hotkey;
                }
            })
        };

        info!(
            shortcut = %shortcuts::shortcut_to_string(&toggle_hotkey.borrow()),
            interval_secs = config.interval.as_secs(),
            "app started"
        );

        Ok(Self {
            window,
            shell,
            toggle_hotkey,
            events,
            sender,
            scheduler: Some(scheduler),
            _subscriptions: vec![edits, shortcut_changes],
        })
    }

    /// Handle for posting events from other threads.
    pub fn sender(&self) -> Sender<AppEvent> {
        self.sender.clone()
    }

    pub fn window(&self) -> &NotesWindow {
        &self.window
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn toggle_hotkey(&self) -> HotKey {
        *self.toggle_hotkey.borrow()
    }

    pub fn handle(&mut self, event: AppEvent) -> ControlFlow<()> {
        debug!(?event, "handling event");
        match event {
            AppEvent::TextEdited(text) => self.window.edit(&text),
            AppEvent::Append(line) => {
                let mut text = self.window.text();
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&line);
                self.window.edit(&text);
            }
            AppEvent::Hover(hovering) => self.window.set_hovering(hovering),
            AppEvent::Presence(presence) => self.window.set_presence(presence),
            AppEvent::Command(command) => self.run_command(command),
            AppEvent::Shortcut(chord) => self.handle_shortcut(&chord),
            AppEvent::ToggleWindow => self.toggle_window(),
            AppEvent::Menu(id) => return self.handle_menu(&id),
            AppEvent::Autosave(trigger) => {
                // errors are recorded in the autosave status and retried on the next tick
                let _ = self.window.save_current(trigger);
            }
            AppEvent::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Handles at most one queued event, waiting up to `timeout` for it.
    pub fn poll_event(&mut self, timeout: Duration) -> Option<ControlFlow<()>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.handle(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(ControlFlow::Break(())),
        }
    }

    /// Runs until `Quit`, then performs the final save.
    pub fn run(mut self) -> Result<(), StoreError> {
        while let Ok(event) = self.events.recv() {
            if self.handle(event).is_break() {
                break;
            }
        }
        self.shutdown()
    }

    /// Stops the autosave timer and saves the live buffer synchronously.
    pub fn shutdown(&mut self) -> Result<(), StoreError> {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.window.shutdown()
    }

    fn run_command(&mut self, command: NoteCommand) {
        if let Some(window_command) = self.window.run_command(command) {
            self.shell.apply_window(window_command);
        }
    }

    fn toggle_window(&mut self) {
        let command = self.window.toggle_window_visibility();
        self.shell.apply_window(command);
    }

    fn handle_shortcut(&mut self, chord: &HotKey) {
        if shortcuts::same_chord(chord, &self.toggle_hotkey.borrow()) {
            self.toggle_window();
            return;
        }
        match shortcuts::command_for(chord) {
            Some(command) => self.run_command(command),
            None => debug!(chord = %shortcuts::shortcut_to_string(chord), "unbound key chord"),
        }
    }

    fn handle_menu(&mut self, id: &str) -> ControlFlow<()> {
        match menu::action_for(id) {
            Some(MenuAction::OpenSettings) => self.shell.open_settings(),
            Some(MenuAction::Note(command)) => self.run_command(command),
            Some(MenuAction::Quit) => return ControlFlow::Break(()),
            None => warn!(id, "unknown menu item"),
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcuts::parse_shortcut;
    use crate::store::MemoryBackend;

    #[derive(Default)]
    struct RecordingShell {
        commands: Vec<WindowCommand>,
        settings_opened: usize,
    }

    impl Shell for RecordingShell {
        fn apply_window(&mut self, command: WindowCommand) {
            self.commands.push(command);
        }

        fn open_settings(&mut self) {
            self.settings_opened += 1;
        }
    }

    fn quiet_config() -> AutosaveConfig {
        AutosaveConfig {
            interval: Duration::from_secs(3600),
            debounce: None,
        }
    }

    fn app() -> (App<RecordingShell>, Rc<PreferenceStore>, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = Rc::new(PreferenceStore::open(backend.clone()));
        let app = App::new(store.clone(), RecordingShell::default(), quiet_config())
            .expect("app starts");
        (app, store, backend)
    }

    #[test]
    fn appended_lines_build_the_buffer() {
        let (mut app, _, _) = app();
        assert!(app.handle(AppEvent::Append("first".to_string())).is_continue());
        assert!(app.handle(AppEvent::Append("second".to_string())).is_continue());

        assert_eq!(app.window().text(), "first\nsecond");
        assert_eq!(app.window().chrome().title, "[0] first");
    }

    #[test]
    fn panel_chords_run_note_commands() {
        let (mut app, store, _) = app();
        assert!(app.handle(AppEvent::TextEdited("draft".to_string())).is_continue());

        let chord = parse_shortcut("Cmd+4").expect("valid chord");
        assert!(app.handle(AppEvent::Shortcut(chord)).is_continue());

        assert_eq!(app.window().current_index(), 3);
        assert_eq!(store.get(&keys::NOTES)[0], "draft");

        let escape = parse_shortcut("Escape").expect("valid chord");
        assert!(app.handle(AppEvent::Shortcut(escape)).is_continue());
        assert_eq!(app.shell().commands, vec![WindowCommand::Hide]);
    }

    #[test]
    fn toggle_hotkey_shows_then_hides() {
        let (mut app, _, _) = app();
        let hotkey = app.toggle_hotkey();

        assert!(app.handle(AppEvent::Shortcut(hotkey)).is_continue());
        assert!(app.handle(AppEvent::Shortcut(hotkey)).is_continue());

        assert_eq!(
            app.shell().commands,
            vec![WindowCommand::ShowAndFocus, WindowCommand::Hide]
        );
    }

    #[test]
    fn changed_toggle_shortcut_takes_effect() {
        let (mut app, store, _) = app();
        store
            .set(&keys::TOGGLE_SHORTCUT, "Cmd+Shift+K".to_string())
            .expect("set");

        let chord = parse_shortcut("Cmd+Shift+K").expect("valid chord");
        assert!(shortcuts::same_chord(&app.toggle_hotkey(), &chord));
        assert!(app.handle(AppEvent::Shortcut(chord)).is_continue());
        assert_eq!(app.shell().commands, vec![WindowCommand::ShowAndFocus]);
    }

    #[test]
    fn menu_items_dispatch() {
        let (mut app, _, _) = app();

        assert!(app.handle(AppEvent::Menu("settings".to_string())).is_continue());
        assert_eq!(app.shell().settings_opened, 1);

        assert!(app.handle(AppEvent::Menu("next_note".to_string())).is_continue());
        assert_eq!(app.window().current_index(), 1);

        assert!(app.handle(AppEvent::Menu("bogus".to_string())).is_continue());
        assert!(app.handle(AppEvent::Menu("quit".to_string())).is_break());
    }

    #[test]
    fn autosave_tick_saves_live_buffer() {
        let (mut app, store, _) = app();
        assert!(app.handle(AppEvent::TextEdited("ticked".to_string())).is_continue());

        assert!(app.handle(AppEvent::Autosave(AutosaveTrigger::Periodic)).is_continue());

        assert_eq!(store.get(&keys::NOTES)[0], "ticked");
        let status = app.window().autosave_status();
        assert_eq!(status.last_trigger, Some(AutosaveTrigger::Periodic));
        assert!(!status.pending_changes);
    }

    #[test]
    fn edits_are_saved_after_debounce() {
        let backend = MemoryBackend::new();
        let store = Rc::new(PreferenceStore::open(backend));
        let config = AutosaveConfig {
            interval: Duration::from_secs(3600),
            debounce: Some(Duration::from_millis(10)),
        };
        let mut app = App::new(store.clone(), RecordingShell::default(), config)
            .expect("app starts");

        assert!(app.handle(AppEvent::TextEdited("debounced".to_string())).is_continue());
        let handled = app.poll_event(Duration::from_secs(5));

        assert_eq!(handled, Some(ControlFlow::Continue(())));
        assert_eq!(store.get(&keys::NOTES)[0], "debounced");
        assert_eq!(
            app.window().autosave_status().last_trigger,
            Some(AutosaveTrigger::Debounced)
        );
    }

    #[test]
    fn run_performs_final_save_on_quit() {
        let backend = MemoryBackend::new();
        let store = Rc::new(PreferenceStore::open(backend.clone()));
        let app = App::new(store, RecordingShell::default(), quiet_config()).expect("app starts");

        let sender = app.sender();
        sender
            .send(AppEvent::TextEdited("unsaved".to_string()))
            .expect("send");
        sender.send(AppEvent::Quit).expect("send");
        app.run().expect("final save");

        assert_eq!(
            backend.snapshot().expect("persisted")["notes"][0],
            serde_json::json!("unsaved")
        );
    }
}
