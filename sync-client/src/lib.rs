//! # sync-client
//!
//! Client library for tether sync sessions.
//!
//! This is the library that the command-line tool (and any other local
//! application) uses to open, observe and end the host's sync session.
//!
//! ## Features
//!
//! - **Single Writer**: a lock marker keeps competing local sessions out
//! - **Shared Record**: any local process can read the session descriptor
//! - **Liveness Probing**: descriptors of crashed owners are cleared on sight
//! - **Transport Abstraction**: Pluggable transport layer (TCP, mock)
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use tether_sync_client::{SessionClient, SessionConfig, SessionContext, TcpTransport};
//!
//! let context = Arc::new(SessionContext::new(config_dir));
//! let client = SessionClient::new(
//!     SessionConfig::new("sync.example.com:7420", &token),
//!     context.clone(),
//!     TcpTransport::new(),
//! );
//!
//! client.connect().await?;
//! client.run(shutdown).await?;
//!
//! // From any other process:
//! let (active, descriptor) = context.status().is_connection_active().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod context;
pub mod liveness;
pub mod lock;
pub mod status;
pub mod store;
pub mod transport;

pub use client::{
    ClientError, SessionClient, SessionConfig, SessionEvent, DEFAULT_DIAL_TIMEOUT,
    DEFAULT_HEARTBEAT_INTERVAL, DISCONNECT_GRACE,
};
pub use context::{SessionContext, LOCK_FILE, STATE_FILE};
pub use liveness::{LivenessOracle, SignalOracle, StaticOracle};
pub use lock::{LockError, LockHandle, ProcessLock};
pub use status::{StatusQuery, StatusReport};
pub use store::{StateStore, StoreError};
pub use transport::{MockTransport, TcpTransport, Transport, TransportError, MAX_MESSAGE_SIZE};
