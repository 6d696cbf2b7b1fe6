//! Inlet - Remote-Inbox Ingestion
//!
//! Inlet watches a folder-like remote store, downloads every file it has not
//! seen before into a local inbox directory, and remembers what it downloaded
//! across restarts. Downstream tooling picks files up from the inbox; Inlet's
//! only job is to get each remote file onto disk exactly once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌──────────────┐     ┌───────────┐
//! │  Source  │     │  Poller   │     │ NameResolver │     │ StateStore│
//! │ (remote  │────▶│ (list →   │────▶│ (timestamped │────▶│ (JSON,    │
//! │  store)  │     │  diff →   │     │  unique name)│     │  atomic)  │
//! │          │     │  download)│     │              │     │           │
//! └──────────┘     └───────────┘     └──────────────┘     └───────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Source**: a capability that lists remote entries and downloads bytes
//! - **Candidate**: a listed, non-container entry whose id is not yet tracked
//! - **Cycle**: one list → diff → download-all → persist → sleep iteration
//! - **State file**: the durable `remote id → download record` mapping

pub mod config;
pub mod error;
pub mod namer;
pub mod poller;
pub mod source;
pub mod state;

// Re-exports for convenience
pub use config::InletConfig;
pub use error::{InletError, Result};
pub use poller::{CycleStats, Poller};
pub use source::{local::LocalDirSource, RemoteFile, Source, SourceError};
pub use state::{State, StateEntry, StateStore};
