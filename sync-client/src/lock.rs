//! Process-exclusive lock.
//!
//! A marker file created with `create_new`, so exactly one local process
//! can hold it at a time. The file's only content is the holder's pid.
//! The lock is advisory: nothing stops a process from ignoring it, and a
//! crashed holder leaves the marker behind until someone removes it.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("another sync session is already running (lock: {})", .path.display())]
    AlreadyRunning {
        /// Marker file path.
        path: PathBuf,
        /// Pid recorded in the marker, if readable.
        holder_pid: Option<u32>,
    },

    /// Filesystem failure.
    #[error("lock file I/O error at {}: {source}", .path.display())]
    Io {
        /// Marker file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// The lock marker location.
#[derive(Debug, Clone)]
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    /// Lock backed by the marker at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Marker file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock for the current process.
    ///
    /// Fails immediately with [`LockError::AlreadyRunning`] if the marker
    /// exists; there is no waiting.
    pub fn acquire(&self) -> Result<LockHandle, LockError> {
        self.acquire_as(std::process::id())
    }

    /// Try to take the lock, recording `pid` as the holder.
    pub fn acquire_as(&self, pid: u32) -> Result<LockHandle, LockError> {
        let io_err = |source| LockError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::AlreadyRunning {
                    path: self.path.clone(),
                    holder_pid: self.holder(),
                });
            }
            Err(e) => return Err(io_err(e)),
        };

        let handle = LockHandle {
            path: self.path.clone(),
            pid,
            released: false,
        };
        // On write failure the handle's Drop removes the half-made marker.
        file.write_all(pid.to_string().as_bytes()).map_err(io_err)?;
        debug!(path = %self.path.display(), pid, "lock acquired");
        Ok(handle)
    }

    /// Pid recorded in the marker, if it exists and parses.
    pub fn holder(&self) -> Option<u32> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Whether the marker exists.
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }
}

/// Proof of lock ownership. Releasing (or dropping) removes the marker.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl LockHandle {
    /// Pid written into the marker.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Remove the marker.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "lock released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove lock marker");
            }
        }
    }
}
