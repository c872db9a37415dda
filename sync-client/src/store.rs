//! Persisted State Store.
//!
//! One small JSON file holding [`SyncState`]. Every local process reads it;
//! only the lock holder writes a descriptor into it. Writes go to a sibling
//! `.tmp` file that is then renamed over the canonical path, so readers never
//! observe a half-written document.
//!
//! Within a process, access is serialized by an async `RwLock`. The
//! read-modify-write helpers hold the write half across the whole cycle.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tether_sync_types::{ConnectionDescriptor, SessionId, SyncState};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// State store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure while writing.
    #[error("state file I/O error at {}: {source}", .path.display())]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// State could not be encoded.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No descriptor for the requested session.
    #[error("no active connection")]
    NoActiveConnection,
}

/// Durable cross-process record of the active session.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    guard: RwLock<()>,
}

impl StateStore {
    /// Create a store backed by the file at `path`.
    ///
    /// Nothing is touched on disk until the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: RwLock::new(()),
        }
    }

    /// Path of the canonical state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state.
    ///
    /// Never fails: a missing file is an empty state, and an unreadable or
    /// corrupt file is logged and treated as empty.
    pub async fn load(&self) -> SyncState {
        let _read = self.guard.read().await;
        self.read_file().await
    }

    /// Replace the persisted state.
    pub async fn save(&self, state: &SyncState) -> Result<(), StoreError> {
        let _write = self.guard.write().await;
        self.write_file(state).await
    }

    /// The active descriptor, if any.
    pub async fn connection(&self) -> Option<ConnectionDescriptor> {
        self.load().await.active_connection
    }

    /// Record `descriptor` as the active session, replacing any other.
    pub async fn set_connection(&self, descriptor: ConnectionDescriptor) -> Result<(), StoreError> {
        let _write = self.guard.write().await;
        self.write_file(&SyncState::with_connection(descriptor)).await
    }

    /// Remove the active descriptor.
    ///
    /// Returns `true` if one was removed. An already-empty store is left
    /// untouched (the file is not created).
    pub async fn clear(&self) -> Result<bool, StoreError> {
        let _write = self.guard.write().await;
        if self.read_file().await.is_empty() {
            return Ok(false);
        }
        self.write_file(&SyncState::empty()).await?;
        Ok(true)
    }

    /// Remove the active descriptor only if it belongs to `session_id`.
    pub async fn clear_session(&self, session_id: &SessionId) -> Result<bool, StoreError> {
        let _write = self.guard.write().await;
        match self.read_file().await.active_connection {
            Some(current) if &current.session_id == session_id => {
                self.write_file(&SyncState::empty()).await?;
                Ok(true)
            }
            Some(current) => {
                debug!(
                    stored = %current.session_id,
                    requested = %session_id,
                    "store holds a different session; not clearing"
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Record a heartbeat for `session_id` at `now`.
    ///
    /// Fails with [`StoreError::NoActiveConnection`] without writing when the
    /// store is empty or holds another session. Returns the stored
    /// timestamp, which never moves backwards.
    pub async fn update_heartbeat(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let _write = self.guard.write().await;
        let mut state = self.read_file().await;
        let descriptor = match state.active_connection.as_mut() {
            Some(d) if &d.session_id == session_id => d,
            _ => return Err(StoreError::NoActiveConnection),
        };
        let recorded = descriptor.record_heartbeat(now);
        self.write_file(&state).await?;
        Ok(recorded)
    }

    async fn read_file(&self) -> SyncState {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SyncState::empty(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable; treating as empty");
                return SyncState::empty();
            }
        };
        match serde_json::from_slice(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file corrupt; treating as empty");
                SyncState::empty()
            }
        }
    }

    async fn write_file(&self, state: &SyncState) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let contents = serde_json::to_vec_pretty(state)?;
        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        set_file_permissions_0600(&tmp).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
