//! Ask the server to end this host's session.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tether_sync_client::{SessionClient, SessionConfig, SessionContext, TcpTransport};
use tracing::debug;

use crate::config::{resolve_token, Config, ConfigError};

/// Run the disconnect command.
///
/// The server address falls back to the one recorded by the running
/// session when none is configured.
pub async fn run(config_dir: &Path, server: Option<&str>) -> Result<()> {
    let config = Config::load(config_dir)
        .await
        .context("Failed to load configuration")?;
    let token = resolve_token(config_dir).await?;
    let context = Arc::new(SessionContext::new(config_dir));

    let server = match config.server_address(server) {
        Ok(server) => server,
        Err(ConfigError::MissingServer) => match context.store().connection().await {
            Some(descriptor) => {
                debug!(server = %descriptor.server, "using server from session record");
                descriptor.server
            }
            None => {
                println!("No active session.");
                return Ok(());
            }
        },
        Err(e) => return Err(e.into()),
    };

    let session = SessionConfig::new(&server, &token)
        .with_dial_timeout(config.session.dial_timeout());
    let client = SessionClient::new(session, context, TcpTransport::new());

    let cleared = client.request_disconnect().await?;
    if cleared {
        println!("Disconnected from {server}; session record cleared.");
    } else {
        println!("Disconnect sent to {server}; no local session record.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CREDENTIALS_FILE, ENV_SERVER};
    use chrono::Utc;
    use tempfile::tempdir;
    use tether_sync_client::StateStore;
    use tether_sync_types::{ConnectionDescriptor, DeviceType, SessionId};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Accepts one client, authenticates it and reports whether a
    /// `disconnect` frame arrived.
    async fn fake_server() -> (String, tokio::task::JoinHandle<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut saw_disconnect = false;
            while let Ok(Some(line)) = lines.next_line().await {
                if line.contains(r#""type":"auth""#) {
                    write
                        .write_all(b"{\"type\":\"auth_success\",\"payload\":{}}\n")
                        .await
                        .unwrap();
                } else if line.contains(r#""type":"disconnect""#) {
                    saw_disconnect = true;
                }
            }
            saw_disconnect
        });
        (addr, handle)
    }

    async fn setup(dir: &Path, server: &str) -> StateStore {
        tokio::fs::write(dir.join(CREDENTIALS_FILE), r#"{"token":"tok"}"#)
            .await
            .unwrap();
        let store = StateStore::new(dir.join(tether_sync_client::STATE_FILE));
        store
            .set_connection(ConnectionDescriptor::new(
                SessionId::new("sess_xyz"),
                server,
                DeviceType::Desktop,
                "workstation",
                4242,
                Utc::now(),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn disconnect_notifies_server_and_clears_record() {
        let dir = tempdir().unwrap();
        let (addr, server) = fake_server().await;
        let store = setup(dir.path(), &addr).await;

        run(dir.path(), Some(&addr)).await.unwrap();

        assert!(server.await.unwrap());
        assert!(store.connection().await.is_none());
    }

    #[tokio::test]
    async fn server_falls_back_to_session_record() {
        if std::env::var(ENV_SERVER).is_ok() {
            return;
        }
        let dir = tempdir().unwrap();
        let (addr, server) = fake_server().await;
        let store = setup(dir.path(), &addr).await;

        run(dir.path(), None).await.unwrap();

        assert!(server.await.unwrap());
        assert!(store.connection().await.is_none());
    }

    #[tokio::test]
    async fn unreachable_server_still_clears_record() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let store = setup(dir.path(), &addr).await;

        let result = run(dir.path(), Some(&addr)).await;

        assert!(result.is_err());
        assert!(store.connection().await.is_none());
    }
}
