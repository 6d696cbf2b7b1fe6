//! Durable record of what has already been downloaded.
//!
//! The whole working memory of the daemon is one mapping from remote id to
//! download record, kept as a single human-inspectable JSON document.
//! Deleting the file forces a full re-download; that is the supported reset
//! path. The document is never hand-edited while the loop runs.
//!
//! Persistence is write-temp-then-rename: a reader (or a crash at any
//! point) sees either the previous complete document or the new complete
//! document, never a mixture.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{InletError, Result};

/// One record per successfully downloaded remote file.
///
/// Written only after the download fully succeeded; never written for
/// skipped or failed candidates; never deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateEntry {
    /// Remote display name at the time of download.
    pub original_name: String,
    /// Filename the bytes landed under in the inbox.
    pub local_name: String,
    /// When the download completed (UTC, ISO-8601 in the document).
    pub downloaded_at: DateTime<Utc>,
}

/// The full `remote id → record` mapping.
///
/// A `BTreeMap` keeps the serialized document byte-stable: persisting an
/// unchanged mapping rewrites an identical file.
pub type State = BTreeMap<String, StateEntry>;

/// Loads and persists the state document at a fixed path.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted mapping. A missing file is a fresh start, not an
    /// error. A file that exists but does not parse is fatal — silently
    /// starting over would re-download everything and overwrite the record.
    pub fn load(&self) -> Result<State> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(State::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: State = serde_json::from_str(&raw).map_err(|source| InletError::CorruptState {
            path: self.path.clone(),
            source,
        })?;
        info!(tracked = state.len(), path = %self.path.display(), "Loaded state");
        Ok(state)
    }

    /// Write the entire mapping durably.
    ///
    /// The document is staged in a temporary file in the same directory,
    /// flushed to disk, then renamed over the target, so the target path
    /// always holds a complete document.
    pub fn persist(&self, state: &State) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        let document = serde_json::to_string_pretty(state)?;
        staged.write_all(document.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|e| InletError::Io(e.error))?;

        Ok(())
    }

    /// Membership check used by the diff step.
    pub fn contains(state: &State, remote_id: &str) -> bool {
        state.contains_key(remote_id)
    }
}
