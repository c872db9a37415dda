//! Identity types for tether sessions and devices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SyncError;

/// Opaque session identifier assigned by the sync server.
///
/// When the server omits one, a local fallback is derived from the
/// handshake completion time.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a server-issued session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a local fallback id (`local-<unix millis>`).
    pub fn local_fallback(at: DateTime<Utc>) -> Self {
        Self(format!("local-{}", at.timestamp_millis()))
    }

    /// Whether this id was generated locally rather than by the server.
    pub fn is_local_fallback(&self) -> bool {
        self.0.starts_with("local-")
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of device announced to the server in the `connect` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Phone or tablet
    Mobile,
    /// Desktop or laptop
    #[default]
    Desktop,
    /// Browser client
    Web,
}

impl DeviceType {
    /// Wire name of the device type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Desktop => "desktop",
            DeviceType::Web => "web",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(DeviceType::Mobile),
            "desktop" => Ok(DeviceType::Desktop),
            "web" => Ok(DeviceType::Web),
            other => Err(SyncError::InvalidDeviceType(other.to_string())),
        }
    }
}
