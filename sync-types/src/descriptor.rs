//! The durable record of the active sync session.
//!
//! [`SyncState`] is the entire persisted state of the session coordinator:
//! zero or one [`ConnectionDescriptor`]. There is no history and no queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{DeviceType, SessionId};

fn connected_default() -> bool {
    true
}

/// Description of the single active session on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Always true for a persisted descriptor
    #[serde(default = "connected_default")]
    pub connected: bool,
    /// Server-issued (or locally derived) session id
    pub session_id: SessionId,
    /// `host:port` of the server socket
    pub server: String,
    /// When the handshake completed (local clock)
    pub connected_at: DateTime<Utc>,
    /// Kind of device announced to the server
    pub device_type: DeviceType,
    /// Device name announced to the server
    pub device_name: String,
    /// Most recent heartbeat recorded by the owner
    pub last_heartbeat: DateTime<Utc>,
    /// Process that opened the session and holds the lock
    #[serde(rename = "pid")]
    pub owner_pid: u32,
}

impl ConnectionDescriptor {
    /// Create a descriptor for a session whose handshake completed at `now`.
    pub fn new(
        session_id: SessionId,
        server: impl Into<String>,
        device_type: DeviceType,
        device_name: impl Into<String>,
        owner_pid: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            connected: true,
            session_id,
            server: server.into(),
            connected_at: now,
            device_type,
            device_name: device_name.into(),
            last_heartbeat: now,
            owner_pid,
        }
    }

    /// Record a heartbeat, never moving `last_heartbeat` backwards.
    ///
    /// Returns the value actually stored.
    pub fn record_heartbeat(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        if at > self.last_heartbeat {
            self.last_heartbeat = at;
        }
        self.last_heartbeat
    }

    /// Time since the last heartbeat (zero if the clock went backwards).
    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_heartbeat).to_std().unwrap_or(Duration::ZERO)
    }

    /// Time since the handshake completed (zero if the clock went backwards).
    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        (now - self.connected_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Persisted container for the optional active connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// The active session, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_connection: Option<ConnectionDescriptor>,
}

impl SyncState {
    /// State with no active session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// State holding the given session.
    pub fn with_connection(descriptor: ConnectionDescriptor) -> Self {
        Self {
            active_connection: Some(descriptor),
        }
    }

    /// Whether no session is recorded.
    pub fn is_empty(&self) -> bool {
        self.active_connection.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::new(
            SessionId::new("sess_xyz"),
            "sync.example.com:7420",
            DeviceType::Desktop,
            "workstation",
            4242,
            at(1_705_000_000),
        )
    }

    #[test]
    fn new_descriptor_starts_with_heartbeat_at_connect_time() {
        let d = descriptor();
        assert!(d.connected);
        assert_eq!(d.last_heartbeat, d.connected_at);
    }

    #[test]
    fn heartbeat_never_moves_backwards() {
        let mut d = descriptor();
        assert_eq!(d.record_heartbeat(at(1_705_000_030)), at(1_705_000_030));
        assert_eq!(d.record_heartbeat(at(1_705_000_010)), at(1_705_000_030));
        assert_eq!(d.last_heartbeat, at(1_705_000_030));
    }

    #[test]
    fn ages_are_measured_from_now() {
        let d = descriptor();
        let now = at(1_705_000_090);
        assert_eq!(d.heartbeat_age(now), Duration::from_secs(90));
        assert_eq!(d.uptime(now), Duration::from_secs(90));
        assert_eq!(d.heartbeat_age(at(1_704_999_000)), Duration::ZERO);
    }

    #[test]
    fn file_format_uses_pid_key() {
        let json = serde_json::to_value(SyncState::with_connection(descriptor())).unwrap();
        let conn = &json["active_connection"];
        assert_eq!(conn["pid"], 4242);
        assert_eq!(conn["connected"], true);
        assert_eq!(conn["session_id"], "sess_xyz");
        assert_eq!(conn["device_type"], "desktop");
        assert!(conn.get("owner_pid").is_none());
    }

    #[test]
    fn empty_state_omits_connection() {
        let json = serde_json::to_string(&SyncState::empty()).unwrap();
        assert_eq!(json, "{}");
        let restored: SyncState = serde_json::from_str("{}").unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn connected_flag_defaults_to_true() {
        let mut json = serde_json::to_value(descriptor()).unwrap();
        json.as_object_mut().unwrap().remove("connected");
        let restored: ConnectionDescriptor = serde_json::from_value(json).unwrap();
        assert!(restored.connected);
    }
}
