//! Per-host session context.
//!
//! Bundles the state store, the lock and the liveness oracle for one config
//! directory, so every operation receives them explicitly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::liveness::{LivenessOracle, SignalOracle};
use crate::lock::ProcessLock;
use crate::status::StatusQuery;
use crate::store::StateStore;

/// File name of the persisted session record.
pub const STATE_FILE: &str = "sync_state.json";

/// File name of the lock marker.
pub const LOCK_FILE: &str = "sync.lock";

/// Store, lock and oracle rooted at one directory.
pub struct SessionContext {
    dir: PathBuf,
    store: StateStore,
    lock: ProcessLock,
    oracle: Arc<dyn LivenessOracle>,
}

impl SessionContext {
    /// Context for `dir` using signal-based liveness probing.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_oracle(dir, Arc::new(SignalOracle))
    }

    /// Context for `dir` with a custom liveness oracle.
    pub fn with_oracle(dir: impl Into<PathBuf>, oracle: Arc<dyn LivenessOracle>) -> Self {
        let dir = dir.into();
        Self {
            store: StateStore::new(dir.join(STATE_FILE)),
            lock: ProcessLock::new(dir.join(LOCK_FILE)),
            dir,
            oracle,
        }
    }

    /// Directory holding the state and lock files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The persisted state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The lock marker.
    pub fn lock(&self) -> &ProcessLock {
        &self.lock
    }

    /// The liveness oracle.
    pub fn oracle(&self) -> &dyn LivenessOracle {
        self.oracle.as_ref()
    }

    /// Status query over this context.
    pub fn status(&self) -> StatusQuery<'_> {
        StatusQuery::new(&self.store, self.oracle.as_ref())
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::StaticOracle;
    use tempfile::TempDir;

    #[test]
    fn files_live_in_context_dir() {
        let dir = TempDir::new().unwrap();
        let ctx = SessionContext::new(dir.path());

        assert_eq!(ctx.dir(), dir.path());
        assert_eq!(ctx.store().path(), dir.path().join(STATE_FILE));
        assert_eq!(ctx.lock().path(), dir.path().join(LOCK_FILE));
    }

    #[tokio::test]
    async fn fresh_context_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let ctx = SessionContext::with_oracle(dir.path(), Arc::new(StaticOracle::new()));

        let (active, _) = ctx.status().is_connection_active().await;

        assert!(!active);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
