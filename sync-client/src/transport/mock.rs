//! Mock transport for testing.
//!
//! Allows queueing responses and capturing sent messages for verification.
//! By default an empty receive queue reads as a closed connection; with
//! [`MockTransport::hold_open`] the stream stays open until the test queues
//! more data or calls [`MockTransport::drop_connection`].

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tether_sync_types::Frame;
use tokio::sync::Notify;

/// Mock transport for testing.
///
/// Allows queueing responses and capturing sent messages for verification.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    wake: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    hold_open: bool,
    peer_closed: bool,
    connected_address: Option<String>,
    sent_messages: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
    fail_sends_from: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose `recv()` waits instead of closing when the
    /// queue is empty.
    pub fn hold_open() -> Self {
        let transport = Self::default();
        transport.inner.lock().unwrap().hold_open = true;
        transport
    }

    /// Queue a message to be returned by the next `recv()` call.
    pub fn queue_response(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(data);
        drop(inner);
        self.wake.notify_waiters();
    }

    /// Number of queued messages not yet read by `recv()`.
    pub fn pending_responses(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.receive_queue.len()
    }

    /// Simulate the server closing the socket.
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.peer_closed = true;
        drop(inner);
        self.wake.notify_waiters();
    }

    /// Get all messages that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Message types of all sent frames, in order.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent_messages()
            .iter()
            .filter_map(|bytes| Frame::from_bytes(bytes).ok())
            .map(|frame| frame.msg_type)
            .collect()
    }

    /// Get the last message that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.last().cloned()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_address.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Cause every send() from now on to fail with the given error.
    pub fn fail_all_sends(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_sends_from = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_recv = Some(error.to_string());
    }

    /// Clear all state (messages, queue, connection).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        let hold_open = inner.hold_open;
        *inner = MockTransportInner {
            hold_open,
            ..Default::default()
        };
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            wake: Arc::clone(&self.wake),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.peer_closed = false;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }
        if let Some(error) = &inner.fail_sends_from {
            return Err(TransportError::SendFailed(error.clone()));
        }

        inner.sent_messages.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        loop {
            // Registered before the queue check so a concurrent push is not missed.
            let notified = self.wake.notified();
            {
                let mut inner = self.inner.lock().unwrap();

                if !inner.connected {
                    return Err(TransportError::NotConnected);
                }

                // Check for forced failure
                if let Some(error) = inner.fail_next_recv.take() {
                    return Err(TransportError::ReceiveFailed(error));
                }

                if let Some(data) = inner.receive_queue.pop_front() {
                    return Ok(data);
                }

                if !inner.hold_open || inner.peer_closed {
                    return Err(TransportError::ConnectionClosed);
                }
            }
            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        drop(inner);
        self.wake.notify_waiters();
        Ok(())
    }
}
