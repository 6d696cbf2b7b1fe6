//! The ingestion state machine.
//!
//! One sequential worker drives repeated cycles of
//! list → diff → download-all → persist → sleep. Every remote entry is
//! downloaded at most once, keyed by its stable remote id; anything that
//! fails is simply still absent from the state mapping and picked up again
//! on a later cycle. No per-file failure escapes a cycle — after startup,
//! the loop only ends when asked to stop.
//!
//! Shutdown follows the stop-channel discipline: the caller keeps the
//! sender, the loop checks at the top of each cycle and waits on the
//! channel during the inter-cycle sleep, so a stop request interrupts the
//! sleep immediately but lets a cycle in progress run to completion. The
//! commit unit is one cycle.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread;

use chrono::{Local, Utc};
use tracing::{debug, error, info, warn};

use crate::config::InletConfig;
use crate::error::Result;
use crate::namer::resolve_local_path;
use crate::source::{RemoteFile, Source, SourceError};
use crate::state::{State, StateEntry, StateStore};

/// Counters for one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Entries returned by the listing.
    pub listed: usize,
    /// Non-container entries not yet tracked at the start of the cycle.
    pub candidates: usize,
    /// Candidates downloaded and recorded this cycle.
    pub downloaded: usize,
    /// Candidates that failed and will be retried on a later cycle.
    pub failed: usize,
}

/// Polls a source and downloads new files into the inbox.
pub struct Poller<S> {
    config: InletConfig,
    source: S,
    store: StateStore,
    state: State,
}

impl<S: Source> Poller<S> {
    /// Build a poller. Loads persisted state; a corrupt state file is fatal
    /// here and the loop never starts.
    pub fn new(config: InletConfig, source: S) -> Result<Self> {
        config.validate()?;
        let store = StateStore::new(&config.state_file);
        let state = store.load()?;
        Ok(Self {
            config,
            source,
            store,
            state,
        })
    }

    /// The in-memory state mapping.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Run until the process dies. Prefer `run_with_shutdown`.
    pub fn run(&mut self) -> Result<()> {
        self.run_inner(None)
    }

    /// Run until a message arrives on `stop_rx` (or its sender is dropped).
    /// A stop request received mid-cycle takes effect once the cycle
    /// completes; one received during the sleep takes effect immediately.
    pub fn run_with_shutdown(&mut self, stop_rx: Receiver<()>) -> Result<()> {
        self.run_inner(Some(stop_rx))
    }

    fn run_inner(&mut self, stop_rx: Option<Receiver<()>>) -> Result<()> {
        info!(
            folder = %self.config.folder_path,
            inbox = %self.config.inbox_dir.display(),
            interval_secs = self.config.poll_interval_secs,
            tracked = self.state.len(),
            "Ingestion loop started"
        );

        loop {
            if let Some(rx) = stop_rx.as_ref() {
                match rx.try_recv() {
                    Ok(()) => {
                        info!("Stop requested");
                        break;
                    }
                    Err(TryRecvError::Disconnected) => {
                        info!("Stop channel closed");
                        break;
                    }
                    Err(TryRecvError::Empty) => {}
                }
            }

            let stats = self.poll_once();
            if stats.candidates > 0 {
                info!(
                    listed = stats.listed,
                    candidates = stats.candidates,
                    downloaded = stats.downloaded,
                    failed = stats.failed,
                    "Cycle complete"
                );
            } else {
                debug!(listed = stats.listed, "Cycle complete, nothing new");
            }

            match stop_rx.as_ref() {
                Some(rx) => match rx.recv_timeout(self.config.poll_interval()) {
                    Ok(()) => {
                        info!("Stop requested during sleep");
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        info!("Stop channel closed during sleep");
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                },
                None => thread::sleep(self.config.poll_interval()),
            }
        }

        // The last persist already ran inside the final cycle; repeating it
        // here covers the path where stop arrived before any cycle ran.
        if let Err(e) = self.store.persist(&self.state) {
            error!(error = %e, "Failed to persist state on shutdown");
        }
        info!(tracked = self.state.len(), "Ingestion loop stopped");
        Ok(())
    }

    /// Execute a single cycle: list, diff against state, download each
    /// candidate independently, persist.
    pub fn poll_once(&mut self) -> CycleStats {
        let mut stats = CycleStats::default();

        let listing = match self.source.list(&self.config.folder_path) {
            Ok(listing) => listing,
            Err(e) => {
                // A failed listing never terminates the loop; state is
                // untouched and the next cycle retries.
                if e.is_transient() {
                    warn!(folder = %self.config.folder_path, error = %e, "Listing failed");
                } else {
                    error!(folder = %self.config.folder_path, error = %e, "Listing failed");
                }
                return stats;
            }
        };
        stats.listed = listing.len();

        // Candidate order is listing order; no implied priority.
        let candidates: Vec<&RemoteFile> = listing
            .iter()
            .filter(|f| !f.is_container && !StateStore::contains(&self.state, &f.id))
            .collect();
        stats.candidates = candidates.len();

        if !candidates.is_empty() {
            info!(count = candidates.len(), "Found new file(s)");
        }

        for file in candidates {
            match self.download_one(file) {
                Ok(local_name) => {
                    // Recorded immediately so a duplicate id later in the
                    // same listing is not downloaded twice.
                    self.state.insert(
                        file.id.clone(),
                        StateEntry {
                            original_name: file.name.clone(),
                            local_name: local_name.clone(),
                            downloaded_at: Utc::now(),
                        },
                    );
                    stats.downloaded += 1;
                    info!(id = %file.id, name = %file.name, local = %local_name, "Downloaded");
                }
                Err(e) => {
                    stats.failed += 1;
                    if e.is_transient() {
                        warn!(id = %file.id, name = %file.name, error = %e, "Download failed, will retry");
                    } else {
                        error!(id = %file.id, name = %file.name, error = %e, "Download failed, will retry");
                    }
                }
            }
        }

        // Persist the full mapping every cycle, changed or not, so progress
        // from earlier cycles is durable even across idle periods.
        if let Err(e) = self.store.persist(&self.state) {
            error!(error = %e, path = %self.store.path().display(), "Failed to persist state");
        }

        stats
    }

    fn download_one(&self, file: &RemoteFile) -> std::result::Result<String, SourceError> {
        let destination = resolve_local_path(
            &self.config.inbox_dir,
            &file.name,
            Local::now().naive_local(),
            |p| p.exists(),
        );

        if let Err(e) = self.source.download(&file.id, &destination) {
            // A failed download must not leave a partial payload where
            // inbox watchers would pick it up.
            let _ = std::fs::remove_file(&destination);
            return Err(e);
        }

        let local_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| destination.display().to_string());
        Ok(local_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use std::path::Path;
    use tempfile::TempDir;

    struct StaticSource {
        listing: std::result::Result<Vec<RemoteFile>, (String, bool)>,
    }

    impl Source for StaticSource {
        fn list(&self, folder: &str) -> std::result::Result<Vec<RemoteFile>, SourceError> {
            match &self.listing {
                Ok(files) => Ok(files.clone()),
                Err((msg, transient)) => Err(SourceError::list(folder, msg.clone(), *transient)),
            }
        }

        fn download(&self, _id: &str, dest: &Path) -> std::result::Result<(), SourceError> {
            std::fs::write(dest, b"bytes").map_err(|e| SourceError::download("?", e.to_string(), true))
        }
    }

    fn test_config(temp: &TempDir) -> InletConfig {
        InletConfig {
            folder_path: "/".to_string(),
            poll_interval_secs: 1,
            inbox_dir: temp.path().join("inbox"),
            state_file: temp.path().join("state.json"),
        }
    }

    fn remote(id: &str, name: &str, is_container: bool) -> RemoteFile {
        RemoteFile {
            id: id.to_string(),
            name: name.to_string(),
            is_container,
            size: None,
            created_at: None,
        }
    }

    #[test]
    fn containers_are_not_candidates() {
        let temp = TempDir::new().unwrap();
        let source = StaticSource {
            listing: Ok(vec![
                remote("d1", "Folder", true),
                remote("f1", "clip.mp3", false),
            ]),
        };
        let mut poller = Poller::new(test_config(&temp), source).unwrap();

        let stats = poller.poll_once();
        assert_eq!(stats.listed, 2);
        assert_eq!(stats.candidates, 1);
        assert_eq!(stats.downloaded, 1);
        assert!(!poller.state().contains_key("d1"));
    }

    #[test]
    fn listing_failure_leaves_state_unchanged() {
        let temp = TempDir::new().unwrap();
        let source = StaticSource {
            listing: Err(("rate limited".to_string(), true)),
        };
        let mut poller = Poller::new(test_config(&temp), source).unwrap();

        let stats = poller.poll_once();
        assert_eq!(stats, CycleStats::default());
        assert!(poller.state().is_empty());
    }

    #[test]
    fn corrupt_state_fails_construction() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        std::fs::write(&config.state_file, "not json").unwrap();

        let source = StaticSource { listing: Ok(vec![]) };
        assert!(Poller::new(config, source).is_err());
    }
}
