//! Advisory file lock serializing record-file access between `rc` processes.
//!
//! Readers take the lock shared, writers exclusive. The lock is advisory: it
//! only coordinates processes that go through [`RecordLock`].

use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};
use tracing::debug;

/// How long store operations wait for a competing `rc` process.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const FIRST_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{} held by another process for {waited:?}", path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Shared for reads, exclusive for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    fn try_lock(self, file: &File) -> io::Result<()> {
        match self {
            Self::Shared => FileExt::try_lock_shared(file),
            Self::Exclusive => FileExt::try_lock_exclusive(file),
        }
    }
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct RecordLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl RecordLock {
    /// Take the lock at `path`, creating the file and its directory if
    /// needed, retrying with growing pauses until `timeout` runs out.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] when another holder keeps a conflicting lock
    /// past `timeout`; [`LockError::Io`] when the lock file cannot be opened.
    pub fn acquire(path: &Path, mode: LockMode, timeout: Duration) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        let started = Instant::now();
        let mut pause = FIRST_BACKOFF;
        while mode.try_lock(&file).is_err() {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(pause.min(timeout.saturating_sub(waited)));
            pause = (pause * 2).min(MAX_BACKOFF);
        }
        debug!(path = %path.display(), ?mode, "record lock taken");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }

    /// # Errors
    ///
    /// See [`RecordLock::acquire`].
    pub fn shared(path: &Path) -> Result<Self, LockError> {
        Self::acquire(path, LockMode::Shared, DEFAULT_LOCK_TIMEOUT)
    }

    /// # Errors
    ///
    /// See [`RecordLock::acquire`].
    pub fn exclusive(path: &Path) -> Result<Self, LockError> {
        Self::acquire(path, LockMode::Exclusive, DEFAULT_LOCK_TIMEOUT)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %err, "record lock release failed");
        }
    }
}
