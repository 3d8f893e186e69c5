use anyhow::Context;
use std::io::{self, BufRead};
use std::rc::Rc;
use std::thread;

use tracing::warn;

use knot_lib::app::{App, AppEvent, Shell};
use knot_lib::autosave::AutosaveConfig;
use knot_lib::error::StoreError;
use knot_lib::shortcuts::{parse_shortcut, NoteCommand};
use knot_lib::state::{ChromeState, WindowCommand, WindowPresence};
use knot_lib::store::{MemoryBackend, PreferenceStore};
use knot_lib::{logging, menu};

/// Prints what a real window layer would do.
struct ConsoleShell;

impl Shell for ConsoleShell {
    fn apply_window(&mut self, command: WindowCommand) {
        match command {
            WindowCommand::Hide => println!("(window hidden)"),
            WindowCommand::ShowAndFocus => println!("(window shown)"),
        }
    }

    fn open_settings(&mut self) {
        println!("(settings: edit preferences.json in the data directory)");
    }
}

fn print_chrome(chrome: &ChromeState) {
    let title = if chrome.title_visible {
        chrome.title.as_str()
    } else {
        ""
    };
    println!(
        "{} | {} | title {:.0} status {:.0}",
        title, chrome.status_text, chrome.title_bar_opacity, chrome.status_bar_opacity
    );
}

fn parse_line(line: &str) -> Result<AppEvent, String> {
    let Some(command) = line.strip_prefix(':') else {
        return Ok(AppEvent::Append(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let argument = parts.next();

    match (name, argument) {
        ("next", None) => Ok(AppEvent::Command(NoteCommand::NextNote)),
        ("prev", None) => Ok(AppEvent::Command(NoteCommand::PreviousNote)),
        ("note", Some(ordinal)) => ordinal
            .parse()
            .map(|ordinal| AppEvent::Command(NoteCommand::SelectNote(ordinal)))
            .map_err(|_| format!("not a note number: {ordinal}")),
        ("hover", Some("on")) => Ok(AppEvent::Hover(true)),
        ("hover", Some("off")) => Ok(AppEvent::Hover(false)),
        ("status", None) => Ok(AppEvent::Command(NoteCommand::ToggleStatusMode)),
        ("toggle", None) => Ok(AppEvent::ToggleWindow),
        ("shown", None) => Ok(AppEvent::Presence(WindowPresence::Visible)),
        ("save", None) => Ok(AppEvent::Command(NoteCommand::SaveNote)),
        ("key", Some(chord)) => parse_shortcut(chord)
            .map(AppEvent::Shortcut)
            .map_err(|error| error.to_string()),
        ("menu", Some(id)) => Ok(AppEvent::Menu(id.to_string())),
        ("settings", None) => Ok(AppEvent::Menu("settings".to_string())),
        ("quit", None) => Ok(AppEvent::Quit),
        _ => Err(format!("unknown command :{command}")),
    }
}

/// Without a data directory the session still runs, it just is not persisted.
fn open_store(opened: Result<PreferenceStore, StoreError>) -> PreferenceStore {
    opened.unwrap_or_else(|error| {
        warn!(%error, "no data directory, notes will not be saved this session");
        PreferenceStore::open(MemoryBackend::new())
    })
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let store = Rc::new(open_store(PreferenceStore::open_default()));
    let app = App::new(store, ConsoleShell, AutosaveConfig::default())
        .context("failed to start autosave timer")?;
    let _chrome = app.window().on_chrome_changed(print_chrome);

    let menu_ids: Vec<&str> = menu::app_menu().iter().map(|item| item.id).collect();
    println!("type to edit, :next :prev :note N :hover on|off :status :toggle :save :settings :quit");
    println!("menu items: {}", menu_ids.join(", "));
    print_chrome(&app.window().chrome());

    let sender = app.sender();
    thread::Builder::new()
        .name("knot-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_line(&line) {
                    Ok(event) => {
                        if sender.send(event).is_err() {
                            return;
                        }
                    }
                    Err(message) => eprintln!("{message}"),
                }
            }
            let _ = sender.send(AppEvent::Quit);
        })
        .context("failed to start input reader")?;

    app.run().context("final save failed")?;
    Ok(())
}
