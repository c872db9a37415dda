//! TcpTransport - newline-delimited JSON frames over a plain TCP socket.
//!
//! The socket is split into a read half and a write half, each behind its
//! own lock, so one task can block in `recv()` while another sends.

use super::{Transport, TransportError, MAX_MESSAGE_SIZE};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// TcpTransport implements the Transport trait over `tokio::net::TcpStream`.
///
/// # Example
///
/// ```ignore
/// let transport = TcpTransport::new();
/// transport.connect("sync.example.com:7420").await?;
/// transport.send(br#"{"type":"heartbeat","payload":{}}"#).await?;
/// let response = transport.recv().await?;
/// ```
#[derive(Debug, Default)]
pub struct TcpTransport {
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
}

impl TcpTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        // Close existing connection if any
        self.close().await.ok();

        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{address}: {e}")))?;
        stream.set_nodelay(true).ok();

        let (read, write) = stream.into_split();
        *self.reader.lock().await = Some(BufReader::new(read));
        *self.writer.lock().await = Some(write);
        self.connected.store(true, Ordering::SeqCst);

        debug!(%address, "tcp connected");
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        // Validate message size
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::MessageTooLarge { size: data.len() });
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let mut line = Vec::with_capacity(data.len() + 1);
        line.extend_from_slice(data);
        line.push(b'\n');

        writer
            .write_all(&line)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(TransportError::NotConnected)?;

        loop {
            let mut line = Vec::new();
            // One byte over the limit so an oversized line is detectable.
            let read = (&mut *reader)
                .take(MAX_MESSAGE_SIZE as u64 + 1)
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

            if read == 0 {
                self.connected.store(false, Ordering::SeqCst);
                return Err(TransportError::ConnectionClosed);
            }

            if line.last() == Some(&b'\n') {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            } else if line.len() > MAX_MESSAGE_SIZE {
                return Err(TransportError::MessageTooLarge { size: line.len() });
            }

            // Blank keep-alive lines carry no frame.
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(line);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            // Signal end of stream
            writer.shutdown().await.ok();
        }
        // A reader parked in recv() keeps its half until it returns.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    // ===========================================
    // Trait Compliance Tests
    // ===========================================

    #[test]
    fn tcp_transport_implements_transport_trait() {
        fn assert_transport<T: Transport>() {}
        assert_transport::<TcpTransport>();
    }

    // ===========================================
    // Connection State Tests
    // ===========================================

    #[tokio::test]
    async fn not_connected_initially() {
        let transport = TcpTransport::new();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(b"data").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_without_connect_succeeds() {
        let transport = TcpTransport::new();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn connect_refused_fails() {
        let (listener, addr) = listener().await;
        drop(listener);

        let transport = TcpTransport::new();
        let result = transport.connect(&addr).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    // ===========================================
    // Framing Tests
    // ===========================================

    #[tokio::test]
    async fn send_appends_newline() {
        let (listener, addr) = listener().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            line
        });

        let transport = TcpTransport::new();
        transport.connect(&addr).await.unwrap();
        transport.send(br#"{"type":"heartbeat","payload":{}}"#).await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            "{\"type\":\"heartbeat\",\"payload\":{}}\n"
        );
    }

    #[tokio::test]
    async fn recv_splits_lines_and_skips_blanks() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"a\":1}\r\n\n{\"b\":2}\n{\"c\":3}")
                .await
                .unwrap();
        });

        let transport = TcpTransport::new();
        transport.connect(&addr).await.unwrap();

        assert_eq!(transport.recv().await.unwrap(), b"{\"a\":1}");
        assert_eq!(transport.recv().await.unwrap(), b"{\"b\":2}");
        // Final line without terminator is still delivered
        assert_eq!(transport.recv().await.unwrap(), b"{\"c\":3}");
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(!transport.is_connected());
    }

    // ===========================================
    // Message Size Validation Tests
    // ===========================================

    #[tokio::test]
    async fn send_oversized_message_fails() {
        let transport = TcpTransport::new();
        let oversized = vec![b'x'; MAX_MESSAGE_SIZE + 1];

        // Size check happens before the connection check
        let result = transport.send(&oversized).await;
        assert!(matches!(result, Err(TransportError::MessageTooLarge { .. })));
    }

    #[tokio::test]
    async fn recv_oversized_line_fails() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let big = vec![b'x'; MAX_MESSAGE_SIZE + 10];
            socket.write_all(&big).await.ok();
            socket.write_all(b"\n").await.ok();
        });

        let transport = TcpTransport::new();
        transport.connect(&addr).await.unwrap();

        assert!(matches!(
            transport.recv().await,
            Err(TransportError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn max_message_size_is_one_megabyte() {
        assert_eq!(MAX_MESSAGE_SIZE, 1024 * 1024);
    }
}
