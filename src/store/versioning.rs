use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::notes::NOTE_COUNT;

pub const CURRENT_VERSION: u32 = 2;

const LEGACY_NOTE_KEY: &str = "noteContent";
const NOTES_KEY: &str = "notes";
const CURRENT_NOTE_INDEX_KEY: &str = "currentNoteIndex";
const ARCHIVED_NOTES_KEY: &str = "archivedNotes";

#[derive(Debug, Serialize, Deserialize)]
struct VersionedStore {
    version: u32,
    data: Value,
}

/// Load a preferences file. Handles both the legacy bare object and the versioned envelope.
/// Returns `None` when nothing has been written yet.
pub fn load_versioned(path: &Path) -> Result<Option<Map<String, Value>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw)?;

    if let Some(obj) = value.as_object() {
        if obj.contains_key("version") && obj.contains_key("data") {
            let store: VersionedStore = serde_json::from_value(value)?;
            return migrate(store.version, store.data).map(Some);
        }
    }

    // Files written before the envelope existed are version 0
    migrate(0, value).map(Some)
}

/// Save preferences in the versioned envelope, atomically via a temp file.
pub fn save_versioned(path: &Path, data: &Map<String, Value>) -> Result<(), StoreError> {
    let store = VersionedStore {
        version: CURRENT_VERSION,
        data: Value::Object(data.clone()),
    };
    let content = serde_json::to_string_pretty(&store)?;
    let write_error = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &content).map_err(write_error)?;
    fs::rename(&tmp_path, path).map_err(write_error)
}

/// Apply migrations from `from_version` to `CURRENT_VERSION`.
pub fn migrate(from_version: u32, data: Value) -> Result<Map<String, Value>, StoreError> {
    let mut current = match data {
        Value::Object(map) => map,
        other => {
            warn!(found = %kind_of(&other), "preferences root is not an object, starting empty");
            Map::new()
        }
    };
    let mut version = from_version;

    if version > CURRENT_VERSION {
        warn!(version, "preferences written by a newer schema, loading what is understood");
        normalize_slots(&mut current);
        return Ok(current);
    }

    while version < CURRENT_VERSION {
        current = match version {
            0 => migrate_v0_to_v1(current),
            1 => migrate_v1_to_v2(current),
            _ => return Err(StoreError::UnknownVersion(version)),
        };
        version += 1;
    }

    Ok(current)
}

/// v0 → v1: the single legacy note becomes a one-element `notes` array.
fn migrate_v0_to_v1(mut data: Map<String, Value>) -> Map<String, Value> {
    let Some(legacy) = data.remove(LEGACY_NOTE_KEY) else {
        return data;
    };

    match legacy {
        Value::String(text) if !data.contains_key(NOTES_KEY) => {
            info!("moving legacy note into slot 0");
            data.insert(NOTES_KEY.to_string(), Value::Array(vec![Value::String(text)]));
        }
        Value::String(text) => {
            warn!("legacy note found next to a notes array, archiving it");
            archive(&mut data, text);
        }
        other => {
            warn!(found = %kind_of(&other), "unreadable legacy note discarded");
        }
    }
    data
}

/// v1 → v2: `notes` always holds exactly `NOTE_COUNT` strings.
fn migrate_v1_to_v2(mut data: Map<String, Value>) -> Map<String, Value> {
    data.entry(NOTES_KEY.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    normalize_slots(&mut data);
    data
}

/// Bring a loaded table to the current slot layout, whatever version wrote it.
///
/// A stored `notes` entry is cut or padded to `NOTE_COUNT` slots with non-empty
/// overflow moved to `archivedNotes`; an out-of-range `currentNoteIndex` is removed.
/// Absent keys stay absent.
pub(crate) fn normalize_slots(data: &mut Map<String, Value>) {
    if let Some(stored) = data.remove(NOTES_KEY) {
        let (notes, overflow) = fit_to_slots(stored);
        data.insert(NOTES_KEY.to_string(), notes);
        for text in overflow {
            archive(data, text);
        }
    }

    let index_in_range = data
        .get(CURRENT_NOTE_INDEX_KEY)
        .and_then(Value::as_u64)
        .is_some_and(|index| index < NOTE_COUNT as u64);
    if !index_in_range && data.remove(CURRENT_NOTE_INDEX_KEY).is_some() {
        warn!("stored note index out of range, resetting");
    }
}

/// Splits a `notes` value into exactly `NOTE_COUNT` text slots and the
/// non-empty notes that did not fit, in slot order.
pub(crate) fn fit_to_slots(stored: Value) -> (Value, Vec<String>) {
    let items = match stored {
        Value::Array(items) => items,
        other => {
            warn!(found = %kind_of(&other), "notes entry is not an array, resetting");
            Vec::new()
        }
    };

    let mut notes: Vec<Value> = Vec::with_capacity(NOTE_COUNT);
    let mut overflow = Vec::new();
    for (slot, item) in items.into_iter().enumerate() {
        let text = match item {
            Value::String(text) => text,
            other => {
                warn!(slot, found = %kind_of(&other), "note slot is not text, clearing");
                String::new()
            }
        };
        if slot < NOTE_COUNT {
            notes.push(Value::String(text));
        } else if !text.is_empty() {
            warn!(slot, "note beyond the last slot, archiving");
            overflow.push(text);
        }
    }
    notes.resize(NOTE_COUNT, Value::String(String::new()));
    (Value::Array(notes), overflow)
}

pub(crate) fn archive(data: &mut Map<String, Value>, text: String) {
    let entry = data
        .entry(ARCHIVED_NOTES_KEY.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(items) = entry {
        items.push(Value::String(text));
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
