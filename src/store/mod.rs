//! Typed, observable preference store.
//!
//! Values live in memory as JSON and are written through a [`PreferenceBackend`]
//! on every change. Reads never fail: a missing, mistyped or out-of-range value
//! yields the key's default.

mod backend;
pub mod keys;
mod versioning;

pub use backend::{data_dir, JsonFileBackend, MemoryBackend, PreferenceBackend};
pub use versioning::CURRENT_VERSION;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use tracing::{debug, info, warn};

use crate::bus::{ChangeBus, Subscription};
use crate::error::StoreError;

/// Values that can be kept in the store.
pub trait Preference: Serialize + DeserializeOwned + PartialEq + Clone + 'static {}

impl<T> Preference for T where T: Serialize + DeserializeOwned + PartialEq + Clone + 'static {}

/// A named setting with its default.
pub struct Key<T> {
    name: &'static str,
    default: fn() -> T,
    sanitize: Option<fn(T) -> Option<T>>,
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> Key<T> {
    pub const fn new(name: &'static str, default: fn() -> T) -> Self {
        Self {
            name,
            default,
            sanitize: None,
        }
    }

    /// Stored values are passed through `sanitize`; `None` means "use the default".
    pub const fn sanitized(self, sanitize: fn(T) -> Option<T>) -> Self {
        Self {
            name: self.name,
            default: self.default,
            sanitize: Some(sanitize),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

impl<T: Preference> Key<T> {
    fn decode(&self, raw: Option<&Value>) -> T {
        let Some(raw) = raw else {
            return self.default_value();
        };

        match serde_json::from_value::<T>(raw.clone()) {
            Ok(value) => match self.sanitize {
                Some(sanitize) => sanitize(value).unwrap_or_else(|| {
                    warn!(key = self.name, "stored preference out of range, using default");
                    self.default_value()
                }),
                None => value,
            },
            Err(error) => {
                warn!(key = self.name, %error, "stored preference has an incompatible type, using default");
                self.default_value()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub old: T,
    pub new: T,
}

#[derive(Debug, Clone)]
struct RawChange {
    key: &'static str,
    old: Option<Value>,
    new: Option<Value>,
}

pub struct PreferenceStore {
    values: RefCell<Map<String, Value>>,
    backend: Box<dyn PreferenceBackend>,
    dirty: Cell<bool>,
    changes: ChangeBus<RawChange>,
}

impl PreferenceStore {
    pub fn open(backend: impl PreferenceBackend + 'static) -> Self {
        let mut values = match backend.load() {
            Ok(Some(values)) => {
                info!(keys = values.len(), "preferences loaded");
                values
            }
            Ok(None) => {
                info!("no stored preferences, using defaults");
                Map::new()
            }
            Err(error) => {
                warn!(%error, "failed to load preferences, using defaults");
                Map::new()
            }
        };
        versioning::normalize_slots(&mut values);

        Self {
            values: RefCell::new(values),
            backend: Box::new(backend),
            dirty: Cell::new(false),
            changes: ChangeBus::new(),
        }
    }

    /// Opens the JSON file in the data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::open(JsonFileBackend::at_default_location()?))
    }

    pub fn get<T: Preference>(&self, key: &Key<T>) -> T {
        key.decode(self.values.borrow().get(key.name))
    }

    /// Stores `value`, persists the whole table, then notifies observers of `key`.
    ///
    /// Setting the current value is a no-op. When persisting fails the new value is
    /// still visible to `get`, the store is marked dirty and the error is returned.
    /// Notes past the last slot are moved to `archivedNotes` rather than stored.
    pub fn set<T: Preference>(&self, key: &Key<T>, value: T) -> Result<(), StoreError> {
        let old_raw = self.values.borrow().get(key.name).cloned();
        let old = key.decode(old_raw.as_ref());
        let mut new_raw = serde_json::to_value(&value)?;
        let mut overflow = Vec::new();
        if key.name == keys::NOTES.name() {
            (new_raw, overflow) = versioning::fit_to_slots(new_raw);
        }
        let new = key.decode(Some(&new_raw));

        let unchanged = match &old_raw {
            Some(raw) => *raw == new_raw,
            None => old == new,
        };
        if unchanged && overflow.is_empty() {
            return Ok(());
        }

        {
            let mut values = self.values.borrow_mut();
            values.insert(key.name.to_string(), new_raw.clone());
            for text in overflow {
                versioning::archive(&mut values, text);
            }
        }
        let persisted = self.persist();
        debug!(key = key.name, "preference changed");

        if old != new {
            self.changes.publish(RawChange {
                key: key.name,
                old: old_raw,
                new: Some(new_raw),
            });
        }
        persisted
    }

    /// Drops the stored value so the default applies again.
    pub fn reset<T: Preference>(&self, key: &Key<T>) -> Result<(), StoreError> {
        let Some(old_raw) = self.values.borrow_mut().remove(key.name) else {
            return Ok(());
        };
        let persisted = self.persist();

        if key.decode(Some(&old_raw)) != key.default_value() {
            self.changes.publish(RawChange {
                key: key.name,
                old: Some(old_raw),
                new: None,
            });
        }
        persisted
    }

    /// Calls `callback` with the old and new value on every later change of `key`.
    pub fn observe<T: Preference>(
        &self,
        key: &Key<T>,
        callback: impl Fn(&Change<T>) + 'static,
    ) -> Subscription {
        let key = *key;
        self.changes.subscribe(move |raw| {
            if raw.key != key.name {
                return;
            }
            callback(&Change {
                old: key.decode(raw.old.as_ref()),
                new: key.decode(raw.new.as_ref()),
            });
        })
    }

    /// True while the last write to the backend failed.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Writes the current table to the backend again.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let result = self.backend.save(&self.values.borrow());
        match &result {
            Ok(()) => {
                if self.dirty.replace(false) {
                    info!("preferences persisted after earlier failure");
                }
            }
            Err(error) => {
                self.dirty.set(true);
                warn!(%error, "failed to persist preferences, will retry");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::keys;
    use super::*;
    use crate::visibility::BarBehavior;
    use serde_json::json;
    use std::rc::Rc;

    fn memory_store() -> (PreferenceStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        (PreferenceStore::open(backend.clone()), backend)
    }

    #[test]
    fn unset_keys_return_defaults() {
        let (store, _) = memory_store();
        assert_eq!(store.get(&keys::PADDING), 20.0);
        assert!(store.get(&keys::SHOW_CHARACTER_COUNT));
        assert_eq!(store.get(&keys::TITLE_BAR_BEHAVIOR), BarBehavior::OnHover);
        assert_eq!(store.get(&keys::NOTES), vec![String::new(); 5]);
        assert_eq!(store.get(&keys::CURRENT_NOTE_INDEX), 0);
    }

    #[test]
    fn set_is_visible_immediately_and_persisted() {
        let (store, backend) = memory_store();
        store.set(&keys::PADDING, 32.0).expect("set");

        assert_eq!(store.get(&keys::PADDING), 32.0);
        let snapshot = backend.snapshot().expect("persisted");
        assert_eq!(snapshot["padding"], json!(32.0));
    }

    #[test]
    fn incompatible_or_out_of_range_values_fall_back_to_default() {
        let mut snapshot = Map::new();
        snapshot.insert("padding".to_string(), json!("wide"));
        snapshot.insert("currentNoteIndex".to_string(), json!(11));
        snapshot.insert("titleBarBehavior".to_string(), json!("sometimes"));
        let store = PreferenceStore::open(MemoryBackend::with_snapshot(snapshot));

        assert_eq!(store.get(&keys::PADDING), 20.0);
        assert_eq!(store.get(&keys::CURRENT_NOTE_INDEX), 0);
        assert_eq!(store.get(&keys::TITLE_BAR_BEHAVIOR), BarBehavior::OnHover);
    }

    #[test]
    fn unavailable_backend_at_open_uses_defaults() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        let store = PreferenceStore::open(backend);
        assert_eq!(store.get(&keys::NOTES).len(), 5);
    }

    #[test]
    fn observers_get_old_and_new_values_but_not_current_value_on_register() {
        let (store, _) = memory_store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _subscription = {
            let seen = seen.clone();
            store.observe(&keys::STATUS_BAR_BEHAVIOR, move |change| {
                seen.borrow_mut().push(change.clone())
            })
        };
        assert!(seen.borrow().is_empty());

        store
            .set(&keys::STATUS_BAR_BEHAVIOR, BarBehavior::Always)
            .expect("set");
        assert_eq!(
            *seen.borrow(),
            vec![Change {
                old: BarBehavior::OnHover,
                new: BarBehavior::Always
            }]
        );
    }

    #[test]
    fn setting_same_value_neither_writes_nor_notifies() {
        let (store, backend) = memory_store();
        let hits = Rc::new(Cell::new(0));
        let _subscription = {
            let hits = hits.clone();
            store.observe(&keys::SHOW_TITLE, move |_| hits.set(hits.get() + 1))
        };

        store.set(&keys::SHOW_TITLE, true).expect("set");
        assert_eq!(backend.writes(), 0);
        store.set(&keys::SHOW_TITLE, false).expect("set");
        store.set(&keys::SHOW_TITLE, false).expect("set");
        assert_eq!(backend.writes(), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn observers_only_see_their_key() {
        let (store, _) = memory_store();
        let hits = Rc::new(Cell::new(0));
        let _subscription = {
            let hits = hits.clone();
            store.observe(&keys::COLOR, move |_| hits.set(hits.get() + 1))
        };

        store.set(&keys::PADDING, 4.0).expect("set");
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn failed_persist_keeps_value_and_flush_retries() {
        let (store, backend) = memory_store();
        backend.set_unavailable(true);

        assert!(store.set(&keys::SHOW_ZOOM_BUTTON, false).is_err());
        assert!(!store.get(&keys::SHOW_ZOOM_BUTTON));
        assert!(store.is_dirty());

        backend.set_unavailable(false);
        store.flush().expect("flush");
        assert!(!store.is_dirty());
        assert_eq!(
            backend.snapshot().expect("persisted")["showZoomButton"],
            json!(false)
        );
    }

    #[test]
    fn set_from_observer_is_delivered_after_current_notification() {
        let store = Rc::new(PreferenceStore::open(MemoryBackend::new()));
        let log = Rc::new(RefCell::new(Vec::new()));

        let _mirror = {
            let weak = Rc::downgrade(&store);
            let log = log.clone();
            store.observe(&keys::SHOW_TITLE, move |change| {
                log.borrow_mut().push(format!("title={}", change.new));
                if let Some(store) = weak.upgrade() {
                    let _ = store.set(&keys::SHOW_CLOSE_BUTTON, change.new);
                }
            })
        };
        let _close = {
            let log = log.clone();
            store.observe(&keys::SHOW_CLOSE_BUTTON, move |change| {
                log.borrow_mut().push(format!("close={}", change.new))
            })
        };
        let _late = {
            let log = log.clone();
            store.observe(&keys::SHOW_TITLE, move |change| {
                log.borrow_mut().push(format!("late title={}", change.new))
            })
        };

        store.set(&keys::SHOW_TITLE, false).expect("set");
        assert_eq!(
            *log.borrow(),
            vec!["title=false", "late title=false", "close=false"]
        );
    }

    #[test]
    fn oversized_notes_snapshot_is_cut_to_five_slots_on_open() {
        let mut snapshot = Map::new();
        snapshot.insert("notes".to_string(), json!(["a", "b", "c", "d", "e", "f"]));
        let store = PreferenceStore::open(MemoryBackend::with_snapshot(snapshot));

        assert_eq!(store.get(&keys::NOTES), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(store.get(&keys::ARCHIVED_NOTES), vec!["f"]);
    }

    #[test]
    fn setting_too_many_notes_archives_the_overflow() {
        let (store, backend) = memory_store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _subscription = {
            let seen = seen.clone();
            store.observe(&keys::NOTES, move |change| seen.borrow_mut().push(change.new.clone()))
        };

        let six: Vec<String> = ["1", "2", "3", "4", "5", "6"].map(String::from).to_vec();
        store.set(&keys::NOTES, six).expect("set");

        assert_eq!(store.get(&keys::NOTES), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(store.get(&keys::ARCHIVED_NOTES), vec!["6"]);
        assert_eq!(*seen.borrow(), vec![vec!["1", "2", "3", "4", "5"]]);
        let snapshot = backend.snapshot().expect("persisted");
        assert_eq!(snapshot["notes"], json!(["1", "2", "3", "4", "5"]));
        assert_eq!(snapshot["archivedNotes"], json!(["6"]));
    }

    #[test]
    fn overflow_is_archived_even_when_slots_are_unchanged() {
        let (store, backend) = memory_store();
        let mut notes = vec![String::new(); 5];
        notes.push("late".to_string());

        store.set(&keys::NOTES, notes).expect("set");
        assert_eq!(store.get(&keys::ARCHIVED_NOTES), vec!["late"]);
        assert_eq!(backend.writes(), 1);
    }

    #[test]
    fn reset_restores_default_and_notifies() {
        let (store, _) = memory_store();
        store.set(&keys::PADDING, 3.0).expect("set");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let _subscription = {
            let seen = seen.clone();
            store.observe(&keys::PADDING, move |change| seen.borrow_mut().push(change.new))
        };

        store.reset(&keys::PADDING).expect("reset");
        assert_eq!(store.get(&keys::PADDING), 20.0);
        assert_eq!(*seen.borrow(), vec![20.0]);
    }
}
