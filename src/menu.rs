use crate::shortcuts::NoteCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub id: &'static str,
    pub title: &'static str,
    pub accelerator: Option<&'static str>,
}

const fn item(id: &'static str, title: &'static str, accelerator: Option<&'static str>) -> MenuItem {
    MenuItem {
        id,
        title,
        accelerator,
    }
}

const APP_MENU: &[MenuItem] = &[
    item("settings", "Settings…", Some("Cmd+,")),
    item("toggle_count_mode", "Toggle Count Mode", None),
    item("next_note", "Next Note", Some("Cmd+]")),
    item("previous_note", "Previous Note", Some("Cmd+[")),
    item("save_note", "Save Note", None),
    item("quit", "Quit Knot", Some("Cmd+Q")),
];

pub fn app_menu() -> &'static [MenuItem] {
    APP_MENU
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    OpenSettings,
    Note(NoteCommand),
    Quit,
}

pub fn action_for(id: &str) -> Option<MenuAction> {
    match id {
        "settings" => Some(MenuAction::OpenSettings),
        "toggle_count_mode" => Some(MenuAction::Note(NoteCommand::ToggleStatusMode)),
        "next_note" => Some(MenuAction::Note(NoteCommand::NextNote)),
        "previous_note" => Some(MenuAction::Note(NoteCommand::PreviousNote)),
        "save_note" => Some(MenuAction::Note(NoteCommand::SaveNote)),
        "quit" => Some(MenuAction::Quit),
        _ => None,
    }
}
