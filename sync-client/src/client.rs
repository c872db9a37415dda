//! SessionClient - the owner side of a sync session.
//!
//! This module provides [`SessionClient`], which opens the socket, performs
//! the authenticate/connect handshake, records the session in the state
//! store and then keeps it alive with heartbeats until cancelled or the
//! connection fails.
//!
//! # Architecture
//!
//! SessionClient uses a pure state machine (from sync-core) for lifecycle
//! logic and interprets the actions to perform actual I/O via the Transport
//! trait, the state store and the lock.
//!
//! ```text
//! Application → SessionClient → Transport → Network
//!                   ↓      ↘
//!              sync-core   SessionContext (store, lock, oracle)
//! ```
//!
//! While connected, a reader task pushes decoded frames into a bounded
//! channel; a single control loop selects over that channel, the heartbeat
//! ticker and the cancellation future.
//!
//! # Example
//!
//! ```ignore
//! use tether_sync_client::{SessionClient, SessionConfig, SessionContext, TcpTransport};
//!
//! let context = Arc::new(SessionContext::new(config_dir));
//! let config = SessionConfig::new("sync.example.com:7420", token);
//! let client = SessionClient::new(config, context, TcpTransport::new());
//!
//! client.connect().await?;
//! let reason = client.run(tokio::signal::ctrl_c().map(|_| ())).await?;
//! ```

use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tether_sync_core::{Action, DisconnectReason, Event, LifecycleEvent, SessionState};
use tether_sync_types::{
    ConnectAck, ConnectionDescriptor, DeviceType, Frame, MessageType, SessionId, SyncError,
};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::context::SessionContext;
use crate::lock::{LockError, LockHandle};
use crate::store::StoreError;
use crate::transport::{Transport, TransportError};

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on establishing the socket.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a graceful `disconnect` before the socket is closed.
pub const DISCONNECT_GRACE: Duration = Duration::from_millis(100);

/// Capacity of the reader → control loop channel, and of the event stream
/// handed to the application.
pub const INBOUND_CHANNEL_CAPACITY: usize = 10;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Lock error (including another session already running).
    #[error(transparent)]
    Lock(#[from] LockError),

    /// State store error.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Could not reach the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Server rejected the token.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Not connected to the server.
    #[error("not connected")]
    NotConnected,

    /// This client already has a session open.
    #[error("session already open")]
    AlreadyConnected,
}

impl ClientError {
    /// Whether this is the "another process holds the lock" error.
    pub fn is_already_running(&self) -> bool {
        matches!(self, ClientError::Lock(LockError::AlreadyRunning { .. }))
    }
}

/// Configuration for SessionClient.
#[derive(Clone)]
pub struct SessionConfig {
    /// `host:port` of the sync server.
    pub server: String,
    /// Session token from the login flow.
    pub token: String,
    /// Kind of device announced in `connect`.
    pub device_type: DeviceType,
    /// Device name announced in `connect`.
    pub device_name: String,
    /// Interval between heartbeats.
    pub heartbeat_interval: Duration,
    /// Bound on establishing the socket.
    pub dial_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration with default device metadata and timings.
    pub fn new(server: &str, token: &str) -> Self {
        Self {
            server: server.to_string(),
            token: token.to_string(),
            device_type: DeviceType::default(),
            device_name: "tether device".to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    /// Set the device type.
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Set the device name.
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = name.to_string();
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("server", &self.server)
            .field("token", &"[REDACTED]")
            .field("device_type", &self.device_type)
            .field("device_name", &self.device_name)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("dial_timeout", &self.dial_timeout)
            .finish()
    }
}

/// Events surfaced to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake completed and the descriptor was written.
    Connected(ConnectionDescriptor),
    /// State change pushed by the server.
    SyncUpdate(Value),
    /// Server reported an error without closing the session.
    ServerError(String),
    /// Session ended.
    Disconnected(DisconnectReason),
}

/// What the reader task hands to the control loop.
#[derive(Debug)]
enum Inbound {
    Frame(Frame),
    Closed(String),
}

/// Reader task plus the receiving end of its channel.
struct LiveLoop {
    inbound: mpsc::Receiver<Inbound>,
    reader: JoinHandle<()>,
}

/// Outcome of executing one action.
enum Step {
    Continue,
    Next(Event),
    Fail(Event, ClientError),
}

/// The session owner.
///
/// Manages the connection, the descriptor and the lock for one session.
pub struct SessionClient<T: Transport> {
    config: SessionConfig,
    context: Arc<SessionContext>,
    transport: Arc<T>,
    state: Arc<Mutex<SessionState>>,
    lock: Mutex<Option<LockHandle>>,
    descriptor: Mutex<Option<ConnectionDescriptor>>,
    live: Mutex<Option<LiveLoop>>,
    events: mpsc::Sender<SessionEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
}

impl<T: Transport + 'static> SessionClient<T> {
    /// Create a new SessionClient.
    pub fn new(config: SessionConfig, context: Arc<SessionContext>, transport: T) -> Self {
        let (events, events_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        Self {
            config,
            context,
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(SessionState::new())),
            lock: Mutex::new(None),
            descriptor: Mutex::new(None),
            live: Mutex::new(None),
            events,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Take the event stream. Returns `None` after the first call.
    ///
    /// The stream is bounded: inbound updates are not read off the socket
    /// faster than the receiver drains them. Lifecycle events are dropped
    /// rather than waited on when the stream is full.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Acquire the lock, perform the handshake and record the session.
    ///
    /// On any failure the socket is closed, nothing is persisted and the
    /// lock is released. Another process holding the lock fails fast with
    /// [`LockError::AlreadyRunning`] and leaves the store untouched.
    pub async fn connect(&self) -> Result<ConnectionDescriptor, ClientError> {
        if !matches!(*self.state.lock().await, SessionState::Disconnected) {
            return Err(ClientError::AlreadyConnected);
        }

        let handle = self.context.lock().acquire()?;
        *self.lock.lock().await = Some(handle);

        if let Err(e) = self.reclaim_dead_session().await {
            self.release_lock().await;
            return Err(e);
        }

        let mut next = Some(Event::ConnectRequested);
        let mut failure = None;
        while let Some(event) = next.take() {
            for action in self.apply(event).await {
                match self.perform(action).await {
                    Step::Continue => {}
                    Step::Next(event) => {
                        next = Some(event);
                        break;
                    }
                    Step::Fail(event, err) => {
                        failure.get_or_insert(err);
                        next = Some(event);
                        break;
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        self.descriptor
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    /// Run the connected session until `shutdown` resolves or the
    /// connection fails, then tear it down.
    ///
    /// Returns why the session ended. Teardown itself never fails; problems
    /// while clearing the store or removing the lock are logged.
    pub async fn run<F>(&self, shutdown: F) -> Result<DisconnectReason, ClientError>
    where
        F: Future<Output = ()>,
    {
        let LiveLoop {
            mut inbound,
            reader,
        } = self.live.lock().await.take().ok_or(ClientError::NotConnected)?;
        let session_id = self
            .descriptor
            .lock()
            .await
            .as_ref()
            .map(|d| d.session_id.clone())
            .ok_or(ClientError::NotConnected)?;

        tokio::pin!(shutdown);
        let period = self.config.heartbeat_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = 'session: loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("disconnect requested");
                    break Event::DisconnectRequested;
                }
                _ = ticker.tick() => {
                    if let Some(exit) = self.heartbeat(&session_id).await {
                        break exit;
                    }
                }
                message = inbound.recv() => match message {
                    Some(Inbound::Frame(frame)) => {
                        let Some(event) = self.handle_frame(frame) else {
                            continue 'session;
                        };
                        // A full event stream stalls this loop, and with it
                        // the reader. Heartbeats and shutdown still run.
                        let delivery = self.events.send(event);
                        tokio::pin!(delivery);
                        loop {
                            tokio::select! {
                                sent = &mut delivery => {
                                    if sent.is_err() {
                                        trace!("event stream closed; update dropped");
                                    }
                                    break;
                                }
                                _ = &mut shutdown => {
                                    info!("disconnect requested");
                                    break 'session Event::DisconnectRequested;
                                }
                                _ = ticker.tick() => {
                                    if let Some(exit) = self.heartbeat(&session_id).await {
                                        break 'session exit;
                                    }
                                }
                            }
                        }
                    }
                    Some(Inbound::Closed(reason)) => {
                        error!(%reason, "connection lost");
                        break Event::ConnectionLost { reason };
                    }
                    None => break Event::ConnectionLost { reason: "reader stopped".to_string() },
                },
            }
        };

        // The reader must let go of the transport before it is closed.
        reader.abort();
        let _ = reader.await;
        drop(inbound);

        self.run_actions(exit).await;
        let reason = match &*self.state.lock().await {
            SessionState::Disconnecting { reason } => reason.clone(),
            other => {
                warn!(state = other.name(), "unexpected state after session exit");
                DisconnectReason::Requested
            }
        };
        self.run_actions(Event::TeardownCompleted).await;
        self.descriptor.lock().await.take();

        Ok(reason)
    }

    /// Abandon the session without running it: close the socket and
    /// release the lock.
    ///
    /// Safe after an interrupted [`connect`](Self::connect). A session that
    /// already reached `Connected` is torn down in full: `disconnect` is
    /// sent and its record cleared.
    pub async fn abort(&self) {
        let state = self.state.lock().await.clone();
        if state.is_handshaking() {
            self.run_actions(Event::DisconnectRequested).await;
        } else if state.is_connected() {
            if let Some(LiveLoop { reader, .. }) = self.live.lock().await.take() {
                reader.abort();
                let _ = reader.await;
            }
            self.run_actions(Event::DisconnectRequested).await;
            self.run_actions(Event::TeardownCompleted).await;
            self.descriptor.lock().await.take();
            // The record may have been written by a connect that was
            // dropped before it could remember the descriptor.
            if let Some(session_id) = state.session_id() {
                if let Err(e) = self.context.store().clear_session(session_id).await {
                    warn!(error = %e, "failed to clear session record");
                }
            }
        }
        self.release_lock().await;
    }

    /// Ask the server to end this host's session over a short-lived
    /// connection, then clear the local record.
    ///
    /// Does not take the lock and does not signal the owning process; the
    /// owner notices the cleared record on its next heartbeat. The local
    /// record is cleared even when the server cannot be reached, and that
    /// failure is still returned.
    pub async fn request_disconnect(&self) -> Result<bool, ClientError> {
        let remote = self.send_remote_disconnect().await;
        self.transport.close().await.ok();

        let cleared = self.context.store().clear().await?;
        if cleared {
            info!("local session record cleared");
        }
        remote.map(|()| cleared)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Check if connected.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_connected()
    }

    /// The session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send_remote_disconnect(&self) -> Result<(), ClientError> {
        self.dial().await?;
        let auth = Frame::auth(&self.config.token).map_err(encode_error)?;
        let response = self.request(&auth).await?;
        if let Some(reason) = response.error_message() {
            return Err(ClientError::AuthenticationFailed(reason));
        }
        self.send_frame(&Frame::disconnect()).await?;
        tokio::time::sleep(DISCONNECT_GRACE).await;
        debug!("remote disconnect sent");
        Ok(())
    }

    /// Feed an event to the state machine and return the resulting actions.
    async fn apply(&self, event: Event) -> Vec<Action> {
        let mut state = self.state.lock().await;
        let from = state.name();
        let (next, actions) = state.clone().on_event(event);
        if next.name() != from {
            debug!(from, to = next.name(), "session state changed");
        }
        *state = next;
        actions
    }

    /// Apply an event and execute every resulting action.
    async fn run_actions(&self, event: Event) {
        for action in self.apply(event).await {
            match self.perform(action).await {
                Step::Continue | Step::Next(_) => {}
                Step::Fail(_, e) => warn!(error = %e, "teardown action failed"),
            }
        }
    }

    async fn perform(&self, action: Action) -> Step {
        match action {
            Action::Dial => match self.dial().await {
                Ok(()) => Step::Continue,
                Err(e) => Step::Fail(
                    Event::DialFailed {
                        error: e.to_string(),
                    },
                    e,
                ),
            },
            Action::SendAuth => self.authenticate().await,
            Action::SendConnect => self.announce().await,
            Action::PersistDescriptor => self.persist_descriptor().await,
            Action::StartHeartbeat => {
                let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
                let reader = tokio::spawn(read_frames(Arc::clone(&self.transport), tx));
                *self.live.lock().await = Some(LiveLoop {
                    inbound: rx,
                    reader,
                });
                Step::Continue
            }
            Action::SendDisconnect => {
                match self.send_frame(&Frame::disconnect()).await {
                    Ok(()) => tokio::time::sleep(DISCONNECT_GRACE).await,
                    Err(e) => warn!(error = %e, "failed to send disconnect"),
                }
                Step::Continue
            }
            Action::CloseSocket => {
                if let Err(e) = self.transport.close().await {
                    warn!(error = %e, "failed to close connection");
                }
                Step::Continue
            }
            Action::ClearDescriptor => {
                let session_id = self
                    .descriptor
                    .lock()
                    .await
                    .as_ref()
                    .map(|d| d.session_id.clone());
                if let Some(session_id) = session_id {
                    if let Err(e) = self.context.store().clear_session(&session_id).await {
                        warn!(error = %e, "failed to clear session record");
                    }
                }
                Step::Continue
            }
            Action::ReleaseLock => {
                self.release_lock().await;
                Step::Continue
            }
            Action::EmitEvent(event) => {
                self.emit_lifecycle(event).await;
                Step::Continue
            }
        }
    }

    async fn dial(&self) -> Result<(), ClientError> {
        let server = &self.config.server;
        match tokio::time::timeout(self.config.dial_timeout, self.transport.connect(server)).await
        {
            Ok(Ok(())) => {
                debug!(%server, "socket open");
                Ok(())
            }
            Ok(Err(e)) => Err(ClientError::ConnectionFailed(format!("{server}: {e}"))),
            Err(_) => Err(ClientError::ConnectionFailed(format!(
                "{server}: timed out after {}s",
                self.config.dial_timeout.as_secs()
            ))),
        }
    }

    async fn authenticate(&self) -> Step {
        let auth = match Frame::auth(&self.config.token) {
            Ok(frame) => frame,
            Err(e) => return handshake_failure(encode_error(e)),
        };
        let response = match self.request(&auth).await {
            Ok(response) => response,
            Err(e) => return handshake_failure(e),
        };

        if let Some(reason) = response.error_message() {
            return Step::Fail(
                Event::AuthRejected {
                    reason: reason.clone(),
                },
                ClientError::AuthenticationFailed(reason),
            );
        }
        if response.msg_type != MessageType::AuthSuccess.as_str() {
            debug!(msg_type = %response.msg_type, "treating non-error auth response as success");
        }
        Step::Next(Event::AuthAccepted)
    }

    async fn announce(&self) -> Step {
        let frame = match Frame::connect(self.config.device_type, &self.config.device_name) {
            Ok(frame) => frame,
            Err(e) => return handshake_failure(encode_error(e)),
        };
        let response = match self.request(&frame).await {
            Ok(response) => response,
            Err(e) => return handshake_failure(e),
        };

        if let Some(message) = response.error_message() {
            return handshake_failure(ClientError::Protocol(message));
        }
        if response.msg_type != MessageType::Connected.as_str() {
            debug!(msg_type = %response.msg_type, "unexpected connect response type");
        }

        let ack = if response.payload.is_null() {
            ConnectAck::default()
        } else {
            match response.payload_as::<ConnectAck>() {
                Ok(ack) => ack,
                Err(e) => return handshake_failure(ClientError::Protocol(e.to_string())),
            }
        };

        let session_id = match ack.session_id.filter(|id| !id.is_empty()) {
            Some(id) => SessionId::new(id),
            None => {
                let id = SessionId::local_fallback(Utc::now());
                warn!(session = %id, "server sent no session id; using local id");
                id
            }
        };
        Step::Next(Event::ConnectAcknowledged { session_id })
    }

    async fn persist_descriptor(&self) -> Step {
        let Some(session_id) = self.state.lock().await.session_id().cloned() else {
            return Step::Fail(
                Event::PersistFailed {
                    error: "no session id".to_string(),
                },
                ClientError::NotConnected,
            );
        };
        let owner_pid = match self.lock.lock().await.as_ref() {
            Some(handle) => handle.pid(),
            None => std::process::id(),
        };

        let descriptor = ConnectionDescriptor::new(
            session_id,
            &self.config.server,
            self.config.device_type,
            &self.config.device_name,
            owner_pid,
            Utc::now(),
        );
        if let Err(e) = self.context.store().set_connection(descriptor.clone()).await {
            return Step::Fail(
                Event::PersistFailed {
                    error: e.to_string(),
                },
                ClientError::Store(e),
            );
        }
        *self.descriptor.lock().await = Some(descriptor);
        Step::Continue
    }

    /// Clear a descriptor left behind by a process that no longer exists.
    async fn reclaim_dead_session(&self) -> Result<(), ClientError> {
        let Some(existing) = self.context.store().connection().await else {
            return Ok(());
        };
        if self.context.oracle().is_alive(existing.owner_pid) {
            warn!(
                pid = existing.owner_pid,
                session = %existing.session_id,
                "session record owned by a live process without the lock; it will be replaced"
            );
            return Ok(());
        }
        debug!(
            pid = existing.owner_pid,
            session = %existing.session_id,
            "reclaiming session record of dead process"
        );
        self.context.store().clear_session(&existing.session_id).await?;
        Ok(())
    }

    async fn release_lock(&self) {
        if let Some(handle) = self.lock.lock().await.take() {
            if let Err(e) = handle.release() {
                warn!(error = %e, "failed to release lock");
            }
        }
    }

    async fn emit_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Connected { session_id } => {
                let descriptor = self.descriptor.lock().await.clone();
                info!(session = %session_id, server = %self.config.server, "sync session established");
                if let Some(descriptor) = descriptor {
                    self.emit(SessionEvent::Connected(descriptor));
                }
            }
            LifecycleEvent::ConnectionFailed { error } => {
                warn!(%error, "sync session could not be established");
            }
            LifecycleEvent::AuthenticationFailed { reason } => {
                warn!(%reason, "server rejected the session token");
            }
            LifecycleEvent::Disconnected { reason } => {
                info!(%reason, "sync session ended");
                self.emit(SessionEvent::Disconnected(reason));
            }
        }
    }

    /// Lifecycle events never wait on the application.
    fn emit(&self, event: SessionEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "event stream full; dropping lifecycle event");
            }
        }
    }

    /// Send a heartbeat and record it. Returns the exit event when the
    /// session has to end.
    async fn heartbeat(&self, session_id: &SessionId) -> Option<Event> {
        if let Err(e) = self.send_frame(&Frame::heartbeat()).await {
            error!(error = %e, "heartbeat failed");
            return Some(Event::HeartbeatFailed {
                error: e.to_string(),
            });
        }
        match self.context.store().update_heartbeat(session_id, Utc::now()).await {
            Ok(at) => trace!(%at, "heartbeat recorded"),
            Err(StoreError::NoActiveConnection) => {
                info!(session = %session_id, "session record cleared by another process");
                return Some(Event::SessionCleared);
            }
            Err(e) => warn!(error = %e, "failed to record heartbeat"),
        }
        None
    }

    /// The application event for an inbound frame, if it warrants one.
    fn handle_frame(&self, frame: Frame) -> Option<SessionEvent> {
        match frame.message_type() {
            Ok(MessageType::SyncUpdate) => {
                debug!("sync update received");
                Some(SessionEvent::SyncUpdate(frame.payload))
            }
            Ok(MessageType::Error) => {
                let message = frame.error_message().unwrap_or_default();
                warn!(%message, "server reported an error");
                Some(SessionEvent::ServerError(message))
            }
            Ok(other) => {
                trace!(msg_type = %other, "frame received");
                None
            }
            Err(_) => {
                debug!(msg_type = %frame.msg_type, "ignoring unknown frame type");
                None
            }
        }
    }

    async fn send_frame(&self, frame: &Frame) -> Result<(), ClientError> {
        let bytes = frame.to_bytes().map_err(encode_error)?;
        self.transport.send(&bytes).await?;
        trace!(msg_type = %frame.msg_type, "frame sent");
        Ok(())
    }

    /// Send a frame and read exactly one response line.
    async fn request(&self, frame: &Frame) -> Result<Frame, ClientError> {
        self.send_frame(frame).await?;
        let bytes = self.transport.recv().await?;
        Frame::from_bytes(&bytes).map_err(|e| {
            ClientError::Protocol(format!("malformed response to {}: {e}", frame.msg_type))
        })
    }
}

fn encode_error(error: SyncError) -> ClientError {
    ClientError::Serialization(error.to_string())
}

fn handshake_failure(error: ClientError) -> Step {
    Step::Fail(
        Event::HandshakeFailed {
            error: error.to_string(),
        },
        error,
    )
}

/// Reader task: decode frames until the connection ends.
async fn read_frames<T: Transport>(transport: Arc<T>, tx: mpsc::Sender<Inbound>) {
    loop {
        let bytes = match transport.recv().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send(Inbound::Closed(e.to_string())).await;
                return;
            }
        };
        match Frame::from_bytes(&bytes) {
            Ok(frame) => {
                // Blocks when the control loop falls behind.
                if tx.send(Inbound::Frame(frame)).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!(error = %e, "skipping malformed frame"),
        }
    }
}
