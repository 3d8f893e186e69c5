use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::warn;

use super::versioning;
use crate::error::StoreError;

const DATA_DIR_ENV: &str = "KNOT_HOME";
const PREFERENCES_FILE: &str = "preferences.json";

/// Where preference snapshots are read from and written to.
pub trait PreferenceBackend {
    fn load(&self) -> Result<Option<Map<String, Value>>, StoreError>;
    fn save(&self, values: &Map<String, Value>) -> Result<(), StoreError>;
}

/// `$KNOT_HOME`, falling back to `~/.knot`.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
    Ok(home.join(".knot"))
}

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Result<Self, StoreError> {
        Ok(Self::new(data_dir()?.join(PREFERENCES_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn quarantine(&self) {
        let backup = self.path.with_extension("json.corrupt");
        match fs::copy(&self.path, &backup) {
            Ok(_) => warn!(backup = %backup.display(), "unreadable preferences copied aside"),
            Err(error) => warn!(%error, "could not copy unreadable preferences aside"),
        }
    }
}

impl PreferenceBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        let loaded = versioning::load_versioned(&self.path);
        if let Err(StoreError::Json(_)) = &loaded {
            self.quarantine();
        }
        loaded
    }

    fn save(&self, values: &Map<String, Value>) -> Result<(), StoreError> {
        versioning::save_versioned(&self.path, values)
    }
}

#[derive(Default)]
struct MemoryInner {
    snapshot: RefCell<Option<Map<String, Value>>>,
    writes: Cell<usize>,
    unavailable: Cell<bool>,
}

/// Process-local backend. Clones share the same snapshot, so a test can keep one
/// handle to inspect writes or simulate an outage while the store owns another.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Rc<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Map<String, Value>) -> Self {
        let backend = Self::default();
        *backend.inner.snapshot.borrow_mut() = Some(snapshot);
        backend
    }

    pub fn snapshot(&self) -> Option<Map<String, Value>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Number of successful saves.
    pub fn writes(&self) -> usize {
        self.inner.writes.get()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.set(unavailable);
    }
}

impl PreferenceBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        if self.inner.unavailable.get() {
            return Err(StoreError::Unavailable("memory backend offline".to_string()));
        }
        Ok(self.snapshot())
    }

    fn save(&self, values: &Map<String, Value>) -> Result<(), StoreError> {
        if self.inner.unavailable.get() {
            return Err(StoreError::Unavailable("memory backend offline".to_string()));
        }
        *self.inner.snapshot.borrow_mut() = Some(values.clone());
        self.inner.writes.set(self.inner.writes.get() + 1);
        Ok(())
    }
}
