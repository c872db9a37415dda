//! Frame - the wire format wrapper for all session messages.
//!
//! Each frame is one JSON object on its own line:
//!
//! ```text
//! {"type":"heartbeat","payload":{}}
//! ```
//!
//! The type is kept as a raw string so that frames with types this client
//! does not know can still be decoded and then ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::{AuthRequest, ConnectRequest, DeviceType, ErrorPayload, SyncError};

/// Message type discriminator carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Client presents its session token
    Auth,
    /// Server accepted the token
    AuthSuccess,
    /// Client announces its device metadata
    Connect,
    /// Server acknowledged the connect, issuing a session id
    Connected,
    /// Graceful disconnect (either direction)
    Disconnect,
    /// Client liveness ping
    Heartbeat,
    /// Server acknowledgement of a heartbeat
    HeartbeatAck,
    /// State change pushed from another device
    SyncUpdate,
    /// Server-side failure report
    Error,
}

impl MessageType {
    /// Wire name of this message type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Auth => "auth",
            MessageType::AuthSuccess => "auth_success",
            MessageType::Connect => "connect",
            MessageType::Connected => "connected",
            MessageType::Disconnect => "disconnect",
            MessageType::Heartbeat => "heartbeat",
            MessageType::HeartbeatAck => "heartbeat_ack",
            MessageType::SyncUpdate => "sync_update",
            MessageType::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(MessageType::Auth),
            "auth_success" => Ok(MessageType::AuthSuccess),
            "connect" => Ok(MessageType::Connect),
            "connected" => Ok(MessageType::Connected),
            "disconnect" => Ok(MessageType::Disconnect),
            "heartbeat" => Ok(MessageType::Heartbeat),
            "heartbeat_ack" => Ok(MessageType::HeartbeatAck),
            "sync_update" => Ok(MessageType::SyncUpdate),
            "error" => Ok(MessageType::Error),
            other => Err(SyncError::UnknownMessageType(other.to_string())),
        }
    }
}

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Message type as sent on the wire
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Type-specific payload (`{}` for empty frames)
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    /// Create a frame with a typed payload.
    pub fn new<P: Serialize>(msg_type: MessageType, payload: &P) -> Result<Self, SyncError> {
        Ok(Self {
            msg_type: msg_type.as_str().to_string(),
            payload: serde_json::to_value(payload).map_err(SyncError::Serialization)?,
        })
    }

    /// Create a frame with an empty object payload.
    pub fn empty(msg_type: MessageType) -> Self {
        Self {
            msg_type: msg_type.as_str().to_string(),
            payload: Value::Object(Map::new()),
        }
    }

    /// `auth` frame carrying the session token.
    pub fn auth(token: &str) -> Result<Self, SyncError> {
        Self::new(
            MessageType::Auth,
            &AuthRequest {
                token: token.to_string(),
            },
        )
    }

    /// `connect` frame carrying device metadata.
    pub fn connect(device_type: DeviceType, device_name: &str) -> Result<Self, SyncError> {
        Self::new(
            MessageType::Connect,
            &ConnectRequest {
                device_type,
                device_name: device_name.to_string(),
            },
        )
    }

    /// `heartbeat` frame.
    pub fn heartbeat() -> Self {
        Self::empty(MessageType::Heartbeat)
    }

    /// `disconnect` frame.
    pub fn disconnect() -> Self {
        Self::empty(MessageType::Disconnect)
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from one JSON line. Surrounding whitespace is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes.trim_ascii()).map_err(SyncError::Deserialization)
    }

    /// Get the message type as an enum.
    pub fn message_type(&self) -> Result<MessageType, SyncError> {
        self.msg_type.parse()
    }

    /// Whether this is an `error` frame.
    pub fn is_error(&self) -> bool {
        self.msg_type == MessageType::Error.as_str()
    }

    /// Decode the payload into a typed struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| SyncError::InvalidPayload {
            msg_type: self.msg_type.clone(),
            reason: e.to_string(),
        })
    }

    /// Human-readable message of an `error` frame.
    ///
    /// Returns `None` for frames of any other type.
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error() {
            return None;
        }
        let message = match self.payload_as::<ErrorPayload>() {
            Ok(payload) => payload.into_message(),
            Err(_) => self.payload.to_string(),
        };
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_wire_format() {
        let bytes = Frame::heartbeat().to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"type":"heartbeat","payload":{}}"#
        );
    }

    #[test]
    fn auth_carries_token() {
        let frame = Frame::auth("tok-123").unwrap();
        assert_eq!(frame.message_type().unwrap(), MessageType::Auth);
        assert_eq!(frame.payload["token"], "tok-123");
    }

    #[test]
    fn connect_carries_device_metadata() {
        let frame = Frame::connect(DeviceType::Mobile, "pixel").unwrap();
        assert_eq!(frame.payload["device_type"], "mobile");
        assert_eq!(frame.payload["device_name"], "pixel");
    }

    #[test]
    fn from_bytes_tolerates_trailing_newline() {
        let frame = Frame::from_bytes(b"{\"type\":\"heartbeat_ack\",\"payload\":{}}\r\n").unwrap();
        assert_eq!(frame.message_type().unwrap(), MessageType::HeartbeatAck);
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let frame = Frame::from_bytes(br#"{"type":"disconnect"}"#).unwrap();
        assert_eq!(frame.payload, Value::Null);
    }

    #[test]
    fn unknown_type_still_decodes() {
        let frame = Frame::from_bytes(br#"{"type":"presence","payload":{"x":1}}"#).unwrap();
        assert!(matches!(
            frame.message_type(),
            Err(SyncError::UnknownMessageType(ref t)) if t == "presence"
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            Frame::from_bytes(b"not json"),
            Err(SyncError::Deserialization(_))
        ));
    }

    #[test]
    fn message_type_names_roundtrip() {
        for mt in [
            MessageType::Auth,
            MessageType::AuthSuccess,
            MessageType::Connect,
            MessageType::Connected,
            MessageType::Disconnect,
            MessageType::Heartbeat,
            MessageType::HeartbeatAck,
            MessageType::SyncUpdate,
            MessageType::Error,
        ] {
            assert_eq!(mt.as_str().parse::<MessageType>().unwrap(), mt);
        }
    }

    #[test]
    fn error_message_from_object_payload() {
        let frame = Frame::from_bytes(br#"{"type":"error","payload":{"message":"bad token"}}"#)
            .unwrap();
        assert_eq!(frame.error_message().as_deref(), Some("bad token"));
    }

    #[test]
    fn error_message_from_string_payload() {
        let frame = Frame::from_bytes(br#"{"type":"error","payload":"expired"}"#).unwrap();
        assert_eq!(frame.error_message().as_deref(), Some("expired"));
    }

    #[test]
    fn error_message_only_for_error_frames() {
        assert!(Frame::heartbeat().error_message().is_none());
    }
}
