//! Shared logging setup for Inlet binaries.
//!
//! Installs two `tracing` layers: a size-rotated log file under the inlet
//! home directory and a stderr layer for interactive use. Both honor
//! `RUST_LOG`; the stderr layer can be widened with `verbose`.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "inlet=info,inlet_logging=info";
const KEEP_ROTATED_FILES: usize = 4;
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;

/// Resolve the inlet home directory: `$INLET_HOME` or `~/.inlet`.
pub fn inlet_home() -> PathBuf {
    if let Ok(overridden) = std::env::var("INLET_HOME") {
        return PathBuf::from(overridden);
    }
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".inlet")
}

/// The logs directory: `<inlet home>/logs`.
pub fn logs_dir() -> PathBuf {
    inlet_home().join("logs")
}

/// Initialize tracing for a binary. `app_name` becomes the log file stem.
pub fn init_logging(app_name: &str, verbose: bool) -> Result<()> {
    let dir = logs_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let writer = RotatingWriter::open(dir, app_name)
        .context("Failed to open rotating log writer")?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let stderr_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .init();

    Ok(())
}

/// Append-only log file that rotates once it crosses `ROTATE_AT_BYTES`.
///
/// Rotation shifts `inlet.log` to `inlet.log.1`, `inlet.log.1` to
/// `inlet.log.2`, and so on, discarding anything past `KEEP_ROTATED_FILES`.
struct LogFile {
    dir: PathBuf,
    stem: String,
    file: File,
    written: u64,
}

impl LogFile {
    fn open(dir: PathBuf, stem: String) -> io::Result<Self> {
        let (file, written) = Self::append_handle(&dir, &stem)?;
        let mut log = Self {
            dir,
            stem,
            file,
            written,
        };
        if log.written >= ROTATE_AT_BYTES {
            log.rotate()?;
        }
        Ok(log)
    }

    fn append_handle(dir: &PathBuf, stem: &str) -> io::Result<(File, u64)> {
        let path = dir.join(format!("{stem}.log"));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        Ok((file, len))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let numbered = |idx: usize| self.dir.join(format!("{}.log.{idx}", self.stem));
        let oldest = numbered(KEEP_ROTATED_FILES);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for idx in (1..KEEP_ROTATED_FILES).rev() {
            let from = numbered(idx);
            if from.exists() {
                fs::rename(&from, numbered(idx + 1))?;
            }
        }
        let active = self.dir.join(format!("{}.log", self.stem));
        if active.exists() {
            fs::rename(&active, numbered(1))?;
        }

        let (file, written) = Self::append_handle(&self.dir, &self.stem)?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > ROTATE_AT_BYTES {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable `MakeWriter` over the shared log file.
#[derive(Clone)]
struct RotatingWriter {
    inner: Arc<Mutex<LogFile>>,
}

impl RotatingWriter {
    fn open(dir: PathBuf, app_name: &str) -> Result<Self> {
        let stem: String = app_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let log = LogFile::open(dir, stem)
            .with_context(|| format!("Failed to open log file for {app_name}"))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(log)),
        })
    }
}

struct RotatingWriterHandle {
    inner: Arc<Mutex<LogFile>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriterHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for RotatingWriterHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .flush()
    }
}
