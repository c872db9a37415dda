//! Typed payloads carried inside [`Frame`](crate::Frame)s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DeviceType;

/// Payload of the `auth` frame.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Session token obtained by the external login flow
    pub token: String,
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Payload of the `connect` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Kind of device
    pub device_type: DeviceType,
    /// Human-readable device name
    pub device_name: String,
}

/// Server acknowledgement of `connect`.
///
/// Both fields are optional on the wire; the client substitutes a local
/// fallback id and its own clock when they are absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectAck {
    /// Server-issued session id
    #[serde(default)]
    pub session_id: Option<String>,
    /// Server-side connection timestamp (RFC 3339)
    #[serde(default)]
    pub connected_at: Option<DateTime<Utc>>,
}

/// Payload of an `error` frame.
///
/// Servers send either `{"message": "..."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    /// Structured error
    Detailed {
        /// Human-readable description
        message: String,
        /// Optional machine-readable code
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    /// Bare error string
    Text(String),
}

impl ErrorPayload {
    /// Flatten into a display message, prefixing the code when present.
    pub fn into_message(self) -> String {
        match self {
            ErrorPayload::Detailed {
                message,
                code: Some(code),
            } => format!("{code}: {message}"),
            ErrorPayload::Detailed { message, code: None } => message,
            ErrorPayload::Text(text) => text,
        }
    }
}
