//! Status Query: is a sync session active on this host?
//!
//! Never touches the lock or the socket. Combines the persisted descriptor
//! with the Liveness Oracle and the heartbeat age. Observing a descriptor
//! whose owner is dead clears it.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;
use tether_sync_core::{ConnectionQuality, Health, HealthThresholds};
use tether_sync_types::ConnectionDescriptor;
use tracing::{debug, warn};

use crate::liveness::LivenessOracle;
use crate::store::StateStore;

/// Classified view of the local session, as printed by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StatusReport {
    /// No live session.
    Inactive,
    /// Owner is alive but heartbeats stopped.
    Stale {
        /// The recorded session.
        descriptor: ConnectionDescriptor,
        /// Time since the last heartbeat.
        #[serde(rename = "heartbeat_age_secs", serialize_with = "as_secs")]
        heartbeat_age: Duration,
    },
    /// Owner alive and heartbeats recent.
    Active {
        /// The recorded session.
        descriptor: ConnectionDescriptor,
        /// Time since the handshake completed.
        #[serde(rename = "uptime_secs", serialize_with = "as_secs")]
        uptime: Duration,
        /// Time since the last heartbeat.
        #[serde(rename = "heartbeat_age_secs", serialize_with = "as_secs")]
        heartbeat_age: Duration,
        /// Quality bucket for the heartbeat age.
        quality: ConnectionQuality,
    },
}

impl StatusReport {
    /// Whether a live, fresh session exists.
    pub fn is_active(&self) -> bool {
        matches!(self, StatusReport::Active { .. })
    }

    /// The recorded descriptor, if any.
    pub fn descriptor(&self) -> Option<&ConnectionDescriptor> {
        match self {
            StatusReport::Inactive => None,
            StatusReport::Stale { descriptor, .. } | StatusReport::Active { descriptor, .. } => {
                Some(descriptor)
            }
        }
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

/// Read-only session query over a store and a liveness oracle.
pub struct StatusQuery<'a> {
    store: &'a StateStore,
    oracle: &'a dyn LivenessOracle,
    thresholds: HealthThresholds,
}

impl<'a> StatusQuery<'a> {
    /// Query with the default health thresholds.
    pub fn new(store: &'a StateStore, oracle: &'a dyn LivenessOracle) -> Self {
        Self {
            store,
            oracle,
            thresholds: HealthThresholds::default(),
        }
    }

    /// Whether a session is active, plus the descriptor if one survives.
    ///
    /// A stale session returns `(false, Some(descriptor))`.
    pub async fn is_connection_active(&self) -> (bool, Option<ConnectionDescriptor>) {
        self.is_connection_active_at(Utc::now()).await
    }

    /// [`is_connection_active`](Self::is_connection_active) against an explicit clock.
    pub async fn is_connection_active_at(
        &self,
        now: DateTime<Utc>,
    ) -> (bool, Option<ConnectionDescriptor>) {
        let Some(descriptor) = self.live_descriptor().await else {
            return (false, None);
        };
        let age = descriptor.heartbeat_age(now);
        (!self.thresholds.is_stale(age), Some(descriptor))
    }

    /// Full classification at `now`.
    pub async fn report(&self, now: DateTime<Utc>) -> StatusReport {
        let Some(descriptor) = self.live_descriptor().await else {
            return StatusReport::Inactive;
        };
        let heartbeat_age = descriptor.heartbeat_age(now);
        match self.thresholds.assess(heartbeat_age) {
            Health::Stale => StatusReport::Stale {
                descriptor,
                heartbeat_age,
            },
            Health::Fresh(quality) => StatusReport::Active {
                uptime: descriptor.uptime(now),
                descriptor,
                heartbeat_age,
                quality,
            },
        }
    }

    /// The stored descriptor if its owner is alive; a dead owner's
    /// descriptor is cleared.
    async fn live_descriptor(&self) -> Option<ConnectionDescriptor> {
        let descriptor = self.store.connection().await?;
        if self.oracle.is_alive(descriptor.owner_pid) {
            return Some(descriptor);
        }

        debug!(
            pid = descriptor.owner_pid,
            session = %descriptor.session_id,
            "session owner is gone; clearing descriptor"
        );
        if let Err(e) = self.store.clear_session(&descriptor.session_id).await {
            warn!(error = %e, "failed to clear dead session");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::StaticOracle;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;
    use tether_sync_types::{DeviceType, SessionId};

    const OWNER: u32 = 4242;

    fn store(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("sync_state.json"))
    }

    fn descriptor(connected_at: DateTime<Utc>) -> ConnectionDescriptor {
        ConnectionDescriptor::new(
            SessionId::new("sess_xyz"),
            "127.0.0.1:7420",
            DeviceType::Desktop,
            "workstation",
            OWNER,
            connected_at,
        )
    }

    // ===========================================
    // is_connection_active Tests
    // ===========================================

    #[tokio::test]
    async fn empty_store_is_inactive() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let oracle = StaticOracle::new();

        let (active, descriptor) = StatusQuery::new(&store, &oracle).is_connection_active().await;

        assert!(!active);
        assert!(descriptor.is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn dead_owner_clears_store() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.set_connection(descriptor(Utc::now())).await.unwrap();
        let oracle = StaticOracle::new();

        let (active, descriptor) = StatusQuery::new(&store, &oracle).is_connection_active().await;

        assert!(!active);
        assert!(descriptor.is_none());
        assert!(store.connection().await.is_none());
    }

    #[tokio::test]
    async fn stale_but_alive_returns_descriptor() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let now = Utc::now();
        store
            .set_connection(descriptor(now - ChronoDuration::minutes(5)))
            .await
            .unwrap();
        let oracle = StaticOracle::with_alive([OWNER]);

        let (active, descriptor) = StatusQuery::new(&store, &oracle)
            .is_connection_active_at(now)
            .await;

        assert!(!active);
        assert_eq!(descriptor.unwrap().session_id.as_str(), "sess_xyz");
        // Stale is not cleared
        assert!(store.connection().await.is_some());
    }

    #[tokio::test]
    async fn fresh_and_alive_is_active() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let now = Utc::now();
        store.set_connection(descriptor(now)).await.unwrap();
        let oracle = StaticOracle::with_alive([OWNER]);

        let (active, descriptor) = StatusQuery::new(&store, &oracle)
            .is_connection_active_at(now + ChronoDuration::seconds(10))
            .await;

        assert!(active);
        assert!(descriptor.is_some());
    }

    // ===========================================
    // Report Tests
    // ===========================================

    #[tokio::test]
    async fn report_quality_tracks_heartbeat_age() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let start = Utc::now();
        store.set_connection(descriptor(start)).await.unwrap();
        let oracle = StaticOracle::with_alive([OWNER]);
        let query = StatusQuery::new(&store, &oracle);

        let quality_at = |secs: i64| {
            let query = &query;
            async move {
                match query.report(start + ChronoDuration::seconds(secs)).await {
                    StatusReport::Active { quality, .. } => Some(quality),
                    _ => None,
                }
            }
        };

        assert_eq!(quality_at(5).await, Some(ConnectionQuality::Good));
        assert_eq!(quality_at(45).await, Some(ConnectionQuality::Fair));
        assert_eq!(quality_at(90).await, Some(ConnectionQuality::Degraded));
        assert_eq!(quality_at(150).await, None);
    }

    #[tokio::test]
    async fn report_stale_carries_age() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let start = Utc::now();
        store.set_connection(descriptor(start)).await.unwrap();
        let oracle = StaticOracle::with_alive([OWNER]);

        let report = StatusQuery::new(&store, &oracle)
            .report(start + ChronoDuration::seconds(300))
            .await;

        match report {
            StatusReport::Stale { heartbeat_age, .. } => {
                assert_eq!(heartbeat_age, Duration::from_secs(300))
            }
            other => panic!("expected stale, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn report_json_shape() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let start = Utc::now();
        store.set_connection(descriptor(start)).await.unwrap();
        let oracle = StaticOracle::with_alive([OWNER]);

        let report = StatusQuery::new(&store, &oracle)
            .report(start + ChronoDuration::seconds(12))
            .await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["state"], "active");
        assert_eq!(json["quality"], "good");
        assert_eq!(json["heartbeat_age_secs"], 12);
        assert_eq!(json["descriptor"]["session_id"], "sess_xyz");

        let inactive = serde_json::to_value(StatusReport::Inactive).unwrap();
        assert_eq!(inactive["state"], "inactive");
    }
}
