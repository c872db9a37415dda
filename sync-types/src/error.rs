//! Error types for the tether wire format.

use thiserror::Error;

/// Errors that can occur while encoding or decoding tether frames.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Frame carried a type this client does not know
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Frame payload did not match the shape expected for its type
    #[error("invalid {msg_type} payload: {reason}")]
    InvalidPayload {
        /// Type of the frame whose payload was rejected.
        msg_type: String,
        /// Why the payload was rejected.
        reason: String,
    },

    /// Device type outside mobile/desktop/web
    #[error("invalid device type: {0} (expected mobile, desktop or web)")]
    InvalidDeviceType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::UnknownMessageType("bogus".into());
        assert_eq!(err.to_string(), "unknown message type: bogus");
    }

    #[test]
    fn invalid_payload_names_the_type() {
        let err = SyncError::InvalidPayload {
            msg_type: "connected".into(),
            reason: "missing field".into(),
        };
        assert_eq!(err.to_string(), "invalid connected payload: missing field");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
