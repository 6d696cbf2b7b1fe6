//! `Source` backed by a locally mounted directory.
//!
//! Remote stores commonly arrive as mounts (SMB shares, FUSE cloud drives,
//! sync-client folders). Treating the mount point as the store keeps the
//! daemon useful with zero network code of its own and gives the tests a
//! real implementation to exercise.
//!
//! Identity comes from the filesystem, not the filename: on unix a
//! device:inode pair survives renames, so a file renamed upstream is not
//! downloaded twice. Where that is unavailable the path itself is the id,
//! which is the best a plain directory can offer.

use super::{RemoteFile, Source, SourceError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A mounted directory exposed through the `Source` capability.
pub struct LocalDirSource {
    root: PathBuf,
    /// id → path, refreshed on every `list`. `download` takes ids, not
    /// paths, so the most recent listing provides the translation.
    seen: Mutex<HashMap<String, PathBuf>>,
}

impl LocalDirSource {
    /// Create a source rooted at `root`. The root must exist; a mount that
    /// is not there at startup is a configuration problem, not a retry case.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SourceError::list(
                root.display().to_string(),
                "source root is not a directory",
                false,
            ));
        }
        Ok(Self {
            root,
            seen: Mutex::new(HashMap::new()),
        })
    }

    fn resolve_folder(&self, folder: &str) -> PathBuf {
        let trimmed = folder.trim_start_matches('/');
        if trimmed.is_empty() {
            self.root.clone()
        } else {
            self.root.join(trimmed)
        }
    }
}

impl Source for LocalDirSource {
    fn list(&self, folder: &str) -> Result<Vec<RemoteFile>, SourceError> {
        let dir = self.resolve_folder(folder);
        let entries = fs::read_dir(&dir).map_err(|e| {
            // A vanished folder on a mount usually means the mount dropped;
            // the next cycle may see it again.
            SourceError::list(folder, e.to_string(), true)
        })?;

        let mut files = Vec::new();
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for entry in entries {
            let entry = entry.map_err(|e| SourceError::list(folder, e.to_string(), true))?;
            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(m) => m,
                // Entry disappeared between readdir and stat; skip it, the
                // next listing settles the matter.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(SourceError::list(folder, e.to_string(), true)),
            };

            let id = entry_id(&path, &metadata);
            seen.insert(id.clone(), path.clone());

            files.push(RemoteFile {
                id,
                name: entry.file_name().to_string_lossy().into_owned(),
                is_container: metadata.is_dir(),
                size: metadata.is_file().then(|| metadata.len()),
                created_at: metadata
                    .created()
                    .ok()
                    .map(DateTime::<Utc>::from),
            });
        }

        Ok(files)
    }

    fn download(&self, id: &str, destination: &Path) -> Result<(), SourceError> {
        let path = {
            let seen = self
                .seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            seen.get(id).cloned()
        };
        let path = path.ok_or_else(|| {
            SourceError::download(id, "entry not present in the latest listing", false)
        })?;

        match fs::copy(&path, destination) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::download(
                id,
                format!("entry vanished from the store: {e}"),
                false,
            )),
            Err(e) => Err(SourceError::download(id, e.to_string(), true)),
        }
    }
}

/// Stable identity for a store entry.
///
/// Unix gives device + inode, which tracks the file through renames. The
/// fallback keys on the normalized path, which is weaker (a rename looks
/// like a new file) but never wrong in the duplicate-download direction.
fn entry_id(path: &Path, metadata: &Metadata) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        return format!("unix:{}:{}", metadata.dev(), metadata.ino());
    }

    #[cfg(not(unix))]
    {
        let _ = metadata;
        let normalized = path.to_string_lossy().replace('\\', "/");
        format!("path:{normalized}")
    }
}
