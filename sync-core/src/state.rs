//! Session state machine for tether.
//!
//! This module provides a pure, side-effect-free state machine for the
//! session lifecycle. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! ```text
//! Disconnected → Authenticating → AwaitingConnectAck → Connected → Disconnecting → Disconnected
//! ```
//!
//! The actual I/O (dialing, sending frames, writing the state file,
//! removing the lock marker) is performed by sync-client, not by this module.

use tether_sync_types::SessionId;

/// Session state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No socket open.
    Disconnected,
    /// Socket dialed, `auth` sent, waiting for the server's verdict.
    Authenticating,
    /// Token accepted, `connect` sent, waiting for the session id.
    AwaitingConnectAck,
    /// Handshake complete; heartbeats running.
    Connected {
        /// Session id recorded in the descriptor.
        session_id: SessionId,
    },
    /// Tearing down the socket, store entry and lock.
    Disconnecting {
        /// Why the session is ending.
        reason: DisconnectReason,
    },
}

impl SessionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested) => {
                (Self::Authenticating, vec![Action::Dial, Action::SendAuth])
            }

            // From Authenticating
            (Self::Authenticating, Event::DialFailed { error }) => (
                Self::Disconnected,
                vec![
                    Action::ReleaseLock,
                    Action::EmitEvent(LifecycleEvent::ConnectionFailed { error }),
                ],
            ),
            (Self::Authenticating, Event::AuthAccepted) => {
                (Self::AwaitingConnectAck, vec![Action::SendConnect])
            }
            (Self::Authenticating, Event::AuthRejected { reason }) => (
                Self::Disconnected,
                vec![
                    Action::CloseSocket,
                    Action::ReleaseLock,
                    Action::EmitEvent(LifecycleEvent::AuthenticationFailed { reason }),
                ],
            ),

            // Handshake failures abort before anything is persisted
            (Self::Authenticating | Self::AwaitingConnectAck, Event::HandshakeFailed { error }) => (
                Self::Disconnected,
                vec![
                    Action::CloseSocket,
                    Action::ReleaseLock,
                    Action::EmitEvent(LifecycleEvent::ConnectionFailed { error }),
                ],
            ),
            (Self::Authenticating | Self::AwaitingConnectAck, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![Action::CloseSocket, Action::ReleaseLock],
            ),

            // From AwaitingConnectAck
            (Self::AwaitingConnectAck, Event::ConnectAcknowledged { session_id }) => (
                Self::Connected {
                    session_id: session_id.clone(),
                },
                vec![
                    Action::PersistDescriptor,
                    Action::StartHeartbeat,
                    Action::EmitEvent(LifecycleEvent::Connected { session_id }),
                ],
            ),

            // From Connected
            (Self::Connected { .. }, Event::PersistFailed { error }) => (
                Self::Disconnected,
                vec![
                    Action::CloseSocket,
                    Action::ReleaseLock,
                    Action::EmitEvent(LifecycleEvent::ConnectionFailed { error }),
                ],
            ),
            (Self::Connected { .. }, Event::DisconnectRequested) => (
                Self::Disconnecting {
                    reason: DisconnectReason::Requested,
                },
                vec![
                    Action::SendDisconnect,
                    Action::CloseSocket,
                    Action::ClearDescriptor,
                    Action::ReleaseLock,
                ],
            ),
            (Self::Connected { .. }, Event::HeartbeatFailed { error }) => (
                Self::Disconnecting {
                    reason: DisconnectReason::HeartbeatFailed(error),
                },
                vec![
                    Action::CloseSocket,
                    Action::ClearDescriptor,
                    Action::ReleaseLock,
                ],
            ),
            (Self::Connected { .. }, Event::ConnectionLost { reason }) => (
                Self::Disconnecting {
                    reason: DisconnectReason::ConnectionLost(reason),
                },
                vec![
                    Action::CloseSocket,
                    Action::ClearDescriptor,
                    Action::ReleaseLock,
                ],
            ),
            // Another process already cleared the store entry.
            (Self::Connected { .. }, Event::SessionCleared) => (
                Self::Disconnecting {
                    reason: DisconnectReason::ClearedExternally,
                },
                vec![
                    Action::SendDisconnect,
                    Action::CloseSocket,
                    Action::ReleaseLock,
                ],
            ),

            // From Disconnecting
            (Self::Disconnecting { reason }, Event::TeardownCompleted) => (
                Self::Disconnected,
                vec![Action::EmitEvent(LifecycleEvent::Disconnected { reason })],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the handshake has completed and the session is live.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if a handshake is in progress.
    pub fn is_handshaking(&self) -> bool {
        matches!(self, Self::Authenticating | Self::AwaitingConnectAck)
    }

    /// Session id of a live session.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Connected { session_id } => Some(session_id),
            _ => None,
        }
    }

    /// Short state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Authenticating => "authenticating",
            Self::AwaitingConnectAck => "awaiting_connect_ack",
            Self::Connected { .. } => "connected",
            Self::Disconnecting { .. } => "disconnecting",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller holds the lock and asked to open a session.
    ConnectRequested,
    /// Dial failed or timed out.
    DialFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Server answered `auth` with a non-error frame.
    AuthAccepted,
    /// Server answered `auth` with an error frame.
    AuthRejected {
        /// Message from the server.
        reason: String,
    },
    /// Server answered `connect` with a parsable acknowledgement.
    ConnectAcknowledged {
        /// Session id to record.
        session_id: SessionId,
    },
    /// Handshake broke down (I/O error, malformed or rejected response).
    HandshakeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The descriptor could not be written after the handshake.
    PersistFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Writing a heartbeat failed; the socket is presumed dead.
    HeartbeatFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The reader observed EOF or a read error.
    ConnectionLost {
        /// Reason reported by the reader.
        reason: String,
    },
    /// The store entry for this session disappeared (another process
    /// ran `disconnect`).
    SessionCleared,
    /// Cancellation signal observed.
    DisconnectRequested,
    /// All teardown actions have run.
    TeardownCompleted,
}

/// Why a live session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Local cancellation (interrupt).
    Requested,
    /// A heartbeat could not be written.
    HeartbeatFailed(String),
    /// The server closed the socket or a read failed.
    ConnectionLost(String),
    /// The store entry was cleared by another local process.
    ClearedExternally,
}

impl DisconnectReason {
    /// Whether the socket was still usable when the session ended.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::Requested | Self::ClearedExternally)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "disconnect requested"),
            Self::HeartbeatFailed(e) => write!(f, "heartbeat failed: {e}"),
            Self::ConnectionLost(e) => write!(f, "connection lost: {e}"),
            Self::ClearedExternally => write!(f, "session cleared by another process"),
        }
    }
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the socket.
    Dial,
    /// Send `auth` and read one response line.
    SendAuth,
    /// Send `connect` and read one response line.
    SendConnect,
    /// Write the new descriptor to the state store.
    PersistDescriptor,
    /// Spawn the reader task and start the heartbeat ticker.
    StartHeartbeat,
    /// Best-effort `disconnect` frame plus grace period.
    SendDisconnect,
    /// Close the socket.
    CloseSocket,
    /// Remove this session's descriptor from the state store.
    ClearDescriptor,
    /// Remove the lock marker.
    ReleaseLock,
    /// Emit an event to the application.
    EmitEvent(LifecycleEvent),
}

/// Lifecycle events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Handshake completed.
    Connected {
        /// Session id recorded in the descriptor.
        session_id: SessionId,
    },
    /// Dial or handshake failed.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Server rejected the token.
    AuthenticationFailed {
        /// Message from the server.
        reason: String,
    },
    /// Session ended.
    Disconnected {
        /// Why the session ended.
        reason: DisconnectReason,
    },
}
