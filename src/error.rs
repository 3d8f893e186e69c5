use std::path::PathBuf;
use thiserror::Error;

/// Failures of the preference persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not find home directory")]
    NoHomeDir,
    #[error("failed to read preferences from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write preferences to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid preferences JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown migration version: {0}")]
    UnknownVersion(u32),
    #[error("preference backend unavailable: {0}")]
    Unavailable(String),
    #[error("note window is busy, save skipped")]
    Busy,
}
