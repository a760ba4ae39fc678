//! Append-only experiment log
//!
//! Safe to share between concurrently running pipelines behind an `Arc`, and
//! between processes appending to the same file. A file-backed append takes
//! an advisory lock on a `.lock` sibling, re-reads the list on disk, adds the
//! entry and replaces the file through a temporary file and a rename. Readers
//! never observe a partial list, and no writer drops another's entries.

use crate::entry::ExperimentLogEntry;
use crate::error::LogError;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Longest wait for another writer to release the log file
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// Ordered, append-only sequence of entries
#[derive(Debug, Default)]
pub struct ExperimentLog {
    inner: Mutex<Vec<ExperimentLogEntry>>,
    path: Option<PathBuf>,
}

impl ExperimentLog {
    /// Log that is never persisted
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed log, loading any entries already on disk
    ///
    /// # Errors
    /// `LogError::Io` if the file exists but cannot be read,
    /// `LogError::Corrupt` if it is not a list of entries.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        let entries = if path.exists() {
            load(&path)?
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "experiment log opened");

        Ok(Self {
            inner: Mutex::new(entries),
            path: Some(path),
        })
    }

    /// Backing file, if any
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one entry and return its index
    ///
    /// For a file-backed log the index is the entry's position in the file,
    /// which counts entries appended by other processes. The entry is only
    /// kept if persisting succeeds, so memory and disk never diverge.
    ///
    /// Blocks while another writer holds the file; call it from a blocking
    /// context when running on an async runtime.
    ///
    /// # Errors
    /// `LogError` if the file cannot be locked, read or written.
    pub fn append(&self, entry: ExperimentLogEntry) -> Result<usize, LogError> {
        let mut guard = self.inner.lock();

        let Some(path) = &self.path else {
            guard.push(entry);
            return Ok(guard.len() - 1);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LogError::io(parent, e))?;
        }

        let _lock = FileLock::acquire(path)?;
        let mut entries = if path.exists() { load(path)? } else { Vec::new() };
        entries.push(entry);
        persist(path, &entries)?;

        *guard = entries;
        Ok(guard.len() - 1)
    }

    /// Snapshot of all entries in append order
    ///
    /// A file-backed log reflects the file as of the last open or append.
    #[must_use]
    pub fn entries(&self) -> Vec<ExperimentLogEntry> {
        self.inner.lock().clone()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Is the log empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Exclusive advisory lock on the log's `.lock` sibling, released on drop
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(log_path: &Path) -> Result<Self, LogError> {
        let path = sibling(log_path, "lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LogError::io(&path, e))?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let start = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(Self { file }),
                Err(err) if err.raw_os_error() == contended => {
                    if start.elapsed() >= LOCK_TIMEOUT {
                        return Err(LogError::LockTimeout {
                            path,
                            secs: LOCK_TIMEOUT.as_secs(),
                        });
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(err) => return Err(LogError::io(&path, err)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Read a persisted log
///
/// # Errors
/// `LogError::Io` on read failure, `LogError::Corrupt` on malformed content.
pub fn load(path: &Path) -> Result<Vec<ExperimentLogEntry>, LogError> {
    let text = fs::read_to_string(path).map_err(|e| LogError::io(path, e))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text).map_err(|e| LogError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn persist(path: &Path, entries: &[ExperimentLogEntry]) -> Result<(), LogError> {
    let json = serde_json::to_string_pretty(entries)?;
    let tmp = sibling(path, "tmp");
    fs::write(&tmp, json).map_err(|e| LogError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| LogError::io(path, e))
}

/// `<file name>.<suffix>` next to `path`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{suffix}"))
}
