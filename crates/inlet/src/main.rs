//! Inlet daemon entry point.
//!
//! Usage:
//!     inlet run --source-root /mnt/drive --folder "/Voice Recordings"
//!     inlet status
//!     inlet reset --yes

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::info;

use inlet::{InletConfig, LocalDirSource, Poller, StateStore};

#[derive(Parser, Debug)]
#[command(name = "inlet", version, about = "Remote-inbox ingestion daemon")]
struct Cli {
    /// Widen stderr logging to debug
    #[arg(long, global = true)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(long, env = "INLET_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion loop in the foreground until interrupted
    Run {
        /// Root of the mounted remote store
        #[arg(long, env = "INLET_SOURCE_ROOT")]
        source_root: PathBuf,

        /// Remote folder to watch (overrides config)
        #[arg(long)]
        folder: Option<String>,

        /// Poll interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,

        /// Inbox directory (overrides config)
        #[arg(long)]
        inbox: Option<PathBuf>,
    },

    /// Report what the state file is tracking
    Status,

    /// Delete the state file, forcing a full re-download on the next run
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    inlet_logging::init_logging("inlet", cli.verbose)?;

    let config = match cli.config.as_deref() {
        Some(path) => InletConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => InletConfig::default(),
    };

    match cli.command {
        Command::Run {
            source_root,
            folder,
            interval,
            inbox,
        } => run(config, source_root, folder, interval, inbox),
        Command::Status => status(&config),
        Command::Reset { yes } => reset(&config, yes),
    }
}

fn run(
    mut config: InletConfig,
    source_root: PathBuf,
    folder: Option<String>,
    interval: Option<u64>,
    inbox: Option<PathBuf>,
) -> Result<()> {
    if let Some(folder) = folder {
        config.folder_path = folder;
    }
    if let Some(interval) = interval {
        config.poll_interval_secs = interval;
    }
    if let Some(inbox) = inbox {
        config.inbox_dir = inbox;
    }

    info!("Starting Inlet");
    info!("  Store root: {}", source_root.display());
    info!("  Folder: {}", config.folder_path);
    info!("  Inbox: {}", config.inbox_dir.display());
    info!("  Interval: {}s", config.poll_interval_secs);

    // Source construction failure (bad mount, bad credentials) is a startup
    // failure and surfaces here rather than inside the loop.
    let source = LocalDirSource::new(&source_root).context("Failed to open source root")?;
    let mut poller = Poller::new(config, source).context("Failed to initialize poller")?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    install_stop_handler(stop_tx)?;

    poller
        .run_with_shutdown(stop_rx)
        .context("Ingestion loop failed")
}

/// Forward SIGINT/SIGTERM (Ctrl+C elsewhere) as one message on the stop
/// channel. Repeated signals are no-ops once the loop is draining.
#[cfg(unix)]
fn install_stop_handler(stop_tx: mpsc::Sender<()>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {sig}, shutting down");
            let _ = stop_tx.send(());
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn install_stop_handler(stop_tx: mpsc::Sender<()>) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down");
        let _ = stop_tx.send(());
    })?;
    Ok(())
}

fn status(config: &InletConfig) -> Result<()> {
    let store = StateStore::new(&config.state_file);
    let state = store.load().context("Failed to read state file")?;

    println!("State file: {}", config.state_file.display());
    println!("Tracked files: {}", state.len());
    if let Some((id, entry)) = state.iter().max_by_key(|(_, e)| e.downloaded_at) {
        println!(
            "Last download: {} -> {} ({}, id {})",
            entry.original_name, entry.local_name, entry.downloaded_at, id
        );
    }
    Ok(())
}

fn reset(config: &InletConfig, yes: bool) -> Result<()> {
    if !yes {
        bail!(
            "reset deletes {} and forces a full re-download; pass --yes to confirm",
            config.state_file.display()
        );
    }
    match std::fs::remove_file(&config.state_file) {
        Ok(()) => {
            println!("Removed {}", config.state_file.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No state file at {}", config.state_file.display());
            Ok(())
        }
        Err(e) => Err(e).context("Failed to remove state file"),
    }
}
