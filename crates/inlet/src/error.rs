//! Error types for Inlet
//!
//! Failures fall into three tiers. Transient and permanent source errors are
//! logged and retried on a later cycle; only startup failures (a corrupt
//! state file, a source that cannot be built) terminate the loop.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::source::SourceError;

/// Inlet error type
#[derive(Error, Debug)]
pub enum InletError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The state file exists but does not parse. Fatal: the loop must not
    /// start, or it would re-download everything and clobber the record.
    #[error("State file {path} is corrupt: {source}")]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, InletError>;

impl InletError {
    /// True when a retry on a later cycle may succeed without intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            InletError::Source(err) => err.is_transient(),
            InletError::Io(_) => false,
            InletError::Json(_) | InletError::CorruptState { .. } | InletError::Config(_) => false,
        }
    }
}
