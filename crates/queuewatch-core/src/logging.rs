//! Log sink: stderr plus a size-rotated file
//!
//! The file sink keeps one backup (`<name>.1`). It rotates when opened over
//! the limit and whenever a write would push it past the limit.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// When to rotate the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    /// Keep the previous file as `<name>.1` instead of discarding it
    pub keep_backup: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 1_000_000,
            keep_backup: true,
        }
    }
}

struct Inner {
    file: File,
    written: u64,
}

/// Append-only log file with size-based rotation
pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    inner: Mutex<Inner>,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let existing = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if existing > policy.max_bytes {
            Self::rotate_files(&path, policy)?;
        }

        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            policy,
            inner: Mutex::new(Inner { file, written }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".1");
        path.with_file_name(name)
    }

    fn rotate_files(path: &Path, policy: RotationPolicy) -> io::Result<()> {
        let backup = Self::backup_path(path);
        match std::fs::remove_file(&backup) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if policy.keep_backup {
            std::fs::rename(path, &backup)
        } else {
            std::fs::remove_file(path)
        }
    }

    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.written > 0 && inner.written + buf.len() as u64 > self.policy.max_bytes {
            Self::rotate_files(&self.path, self.policy)?;
            inner.file = open_append(&self.path)?;
            inner.written = 0;
        }

        inner.file.write_all(buf)?;
        inner.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush_file(&self) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer handed out per log event
pub struct RotatingWriter<'a> {
    file: &'a RotatingFile,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush_file()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { file: self }
    }
}

/// Install the global subscriber.
///
/// Level comes from `RUST_LOG` (default `info`). When `log_file` is given,
/// events also go to that file without ANSI colors. If the file cannot be
/// opened, logging continues on stderr only.
pub fn init(log_file: Option<&Path>, policy: RotationPolicy) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| match RotatingFile::open(path, policy) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file),
        ),
        Err(e) => {
            file_error = Some(format!("{:?}: {}", path, e));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(e) = file_error {
        tracing::warn!("File logging disabled, could not open {}", e);
    }
    tracing::info!("=== queuewatch started ===");
    Ok(())
}
