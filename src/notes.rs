use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::{keys, PreferenceStore};

pub const NOTE_COUNT: usize = 5;

/// The five persisted note slots and the cursor selecting the displayed one.
///
/// Slot contents are read from and written to the preference store; the only
/// state kept here is which slot the caller's live buffer was loaded from.
pub struct NoteCollection {
    store: Rc<PreferenceStore>,
    current_index: usize,
}

impl NoteCollection {
    pub fn new(store: Rc<PreferenceStore>) -> Self {
        let current_index = store.get(&keys::CURRENT_NOTE_INDEX);
        Self {
            store,
            current_index,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn notes(&self) -> Vec<String> {
        self.store.get(&keys::NOTES)
    }

    pub fn note(&self, index: usize) -> Option<String> {
        self.notes().into_iter().nth(index)
    }

    /// Stored text of the current slot.
    pub fn load_current(&self) -> String {
        self.note(self.current_index).unwrap_or_default()
    }

    /// Writes `text` into slot `index` and persists all slots. Out-of-range indices are ignored.
    pub fn save(&self, text: &str, index: usize) -> Result<(), StoreError> {
        let mut notes = self.notes();
        let Some(slot) = notes.get_mut(index) else {
            debug!(index, "ignoring save outside the note slots");
            return Ok(());
        };
        if slot == text {
            return Ok(());
        }
        *slot = text.to_string();
        self.store.set(&keys::NOTES, notes)
    }

    pub fn save_current(&self, text: &str) -> Result<(), StoreError> {
        self.save(text, self.current_index)
    }

    /// Saves `live` into the current slot, selects `new_index`, persists the
    /// selection and replaces `live` with the new slot's text.
    ///
    /// Returns false without touching anything when `new_index` is the current
    /// slot or outside `0..NOTE_COUNT`.
    pub fn switch_to(&mut self, live: &mut String, new_index: usize) -> bool {
        if !self.move_to(live, new_index) {
            return false;
        }
        if let Err(error) = self.store.set(&keys::CURRENT_NOTE_INDEX, new_index) {
            warn!(%error, index = new_index, "note selection not persisted");
        }
        true
    }

    /// Same sequence as `switch_to` for a selection already written to the
    /// store by someone else, so the index is not written back.
    pub fn follow_index(&mut self, live: &mut String, new_index: usize) -> bool {
        self.move_to(live, new_index)
    }

    pub fn next_index(&self) -> usize {
        (self.current_index + 1) % NOTE_COUNT
    }

    pub fn previous_index(&self) -> usize {
        (self.current_index + NOTE_COUNT - 1) % NOTE_COUNT
    }

    pub fn cycle_next(&mut self, live: &mut String) -> bool {
        let index = self.next_index();
        self.switch_to(live, index)
    }

    pub fn cycle_previous(&mut self, live: &mut String) -> bool {
        let index = self.previous_index();
        self.switch_to(live, index)
    }

    /// Cmd+1 … Cmd+5 numbering: `ordinal` 1 is slot 0.
    pub fn switch_to_ordinal(&mut self, live: &mut String, ordinal: usize) -> bool {
        match ordinal {
            1..=NOTE_COUNT => self.switch_to(live, ordinal - 1),
            _ => false,
        }
    }

    fn move_to(&mut self, live: &mut String, new_index: usize) -> bool {
        if new_index == self.current_index || new_index >= NOTE_COUNT {
            return false;
        }

        let old_index = self.current_index;
        if let Err(error) = self.save(live, old_index) {
            // the text is in the store's memory and goes out with the next successful write
            warn!(%error, index = old_index, "note not persisted before switching");
        }
        self.current_index = new_index;
        *live = self.load_current();

        info!(from = old_index, to = new_index, "switched note");
        true
    }
}
