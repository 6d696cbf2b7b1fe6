//! The remote-store capability consumed by the ingestion loop.
//!
//! The loop only ever needs two operations — list a folder, download an
//! entry — so the trait stays that narrow. Implementations own
//! authentication, transport, and timeouts; by the time a `Source` reaches
//! the poller it must already be usable. Keeping the seam this small lets
//! the whole state machine run against an in-memory fake in tests.

pub mod local;

use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

/// One entry in a remote folder listing.
///
/// `id` is the source-assigned stable identity and the only field used for
/// deduplication. `name` is display metadata and may change between
/// listings without affecting identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Opaque, stable, unique per remote entry.
    pub id: String,
    /// Current display name, used to derive the local filename.
    pub name: String,
    /// Folders and other non-downloadable containers are never candidates.
    pub is_container: bool,
    /// Size in bytes, when the source reports it.
    pub size: Option<u64>,
    /// Remote creation time, when the source reports it.
    pub created_at: Option<DateTime<Utc>>,
}

/// Failure from a source operation, tagged with whether retrying on a later
/// cycle is worthwhile.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("listing '{folder}' failed: {message}")]
    List {
        folder: String,
        message: String,
        transient: bool,
    },

    #[error("downloading {id} failed: {message}")]
    Download {
        id: String,
        message: String,
        transient: bool,
    },
}

impl SourceError {
    pub fn list(folder: impl Into<String>, message: impl Into<String>, transient: bool) -> Self {
        SourceError::List {
            folder: folder.into(),
            message: message.into(),
            transient,
        }
    }

    pub fn download(id: impl Into<String>, message: impl Into<String>, transient: bool) -> Self {
        SourceError::Download {
            id: id.into(),
            message: message.into(),
            transient,
        }
    }

    /// Whether the failure is expected to clear on its own (timeouts, rate
    /// limits) as opposed to needing operator attention (entry gone, disk
    /// full). Both tiers are retried next cycle; the tier picks the log level.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::List { transient, .. } | SourceError::Download { transient, .. } => {
                *transient
            }
        }
    }
}

/// A folder-like remote store.
///
/// Implementations must be authenticated before the ingestion loop starts;
/// re-authentication mid-flight is internal to the source and invisible to
/// the loop. Both calls block until done — the loop is strictly sequential
/// and imposes no timeout of its own.
pub trait Source {
    /// List the entries of `folder`, in whatever order the store returns
    /// them. That order becomes candidate order.
    fn list(&self, folder: &str) -> Result<Vec<RemoteFile>, SourceError>;

    /// Download the entry identified by `id` to `destination`. On failure
    /// the destination may be left partially written; the caller never
    /// records partial downloads, so a retry re-resolves a fresh name.
    fn download(&self, id: &str, destination: &Path) -> Result<(), SourceError>;
}
