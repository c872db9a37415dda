//! Open a session and keep it alive until interrupted.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tether_sync_client::{
    ClientError, LockError, SessionClient, SessionConfig, SessionContext, SessionEvent,
    TcpTransport,
};
use tether_sync_types::DeviceType;
use tokio::sync::mpsc::Receiver;
use tracing::debug;

use crate::config::{resolve_token, Config};

/// Flags accepted by `tether connect`.
#[derive(Debug, Default)]
pub struct Options {
    /// Server address override.
    pub server: Option<String>,
    /// Device type override.
    pub device_type: Option<DeviceType>,
    /// Device name override.
    pub device_name: Option<String>,
}

/// Run the connect command.
pub async fn run(config_dir: &Path, options: Options) -> Result<()> {
    let client = session_client(config_dir, &options).await?;

    let outcome = tokio::select! {
        result = client.connect() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(result) = outcome else {
        client.abort().await;
        bail!("interrupted before the session was established");
    };
    result.map_err(|e| explain(e, client.context()))?;

    let printer = match client.take_events().await {
        Some(events) => Some(tokio::spawn(print_events(events))),
        None => None,
    };

    println!("Press Ctrl-C to disconnect.");
    let reason = client
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                debug!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    // Dropping the client closes the event stream.
    drop(client);
    if let Some(printer) = printer {
        printer.await.ok();
    }

    if !reason.is_graceful() {
        bail!("session ended: {reason}");
    }
    Ok(())
}

/// Build a client from the config directory and the command-line flags.
pub(crate) async fn session_client(
    config_dir: &Path,
    options: &Options,
) -> Result<SessionClient<TcpTransport>> {
    let config = Config::load(config_dir)
        .await
        .context("Failed to load configuration")?;
    let token = resolve_token(config_dir).await?;
    let server = config.server_address(options.server.as_deref())?;

    let session = SessionConfig::new(&server, &token)
        .with_device_type(config.device_type(options.device_type))
        .with_device_name(&config.device_name(options.device_name.as_deref()))
        .with_heartbeat_interval(config.session.heartbeat_interval())
        .with_dial_timeout(config.session.dial_timeout());
    debug!(?session, "session settings");

    let context = Arc::new(SessionContext::new(config_dir));
    Ok(SessionClient::new(session, context, TcpTransport::new()))
}

/// Turn lock contention into an actionable message.
fn explain(err: ClientError, context: &SessionContext) -> anyhow::Error {
    let (path, holder_pid) = match err {
        ClientError::Lock(LockError::AlreadyRunning { path, holder_pid }) => (path, holder_pid),
        other => return other.into(),
    };
    match holder_pid {
        Some(pid) if !context.oracle().is_alive(pid) => anyhow!(
            "another sync session is already running (pid {pid})\n\
             process {pid} is no longer running; if no session is active, remove {} and retry",
            path.display()
        ),
        Some(pid) => anyhow!(
            "another sync session is already running (pid {pid}); \
             stop it or run `tether disconnect` first"
        ),
        None => anyhow!(
            "another sync session is already running (lock: {})",
            path.display()
        ),
    }
}

async fn print_events(mut events: Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected(descriptor) => {
                println!("Connected to {}", descriptor.server);
                println!("  Session: {}", descriptor.session_id);
                println!(
                    "  Device:  {} ({})",
                    descriptor.device_name, descriptor.device_type
                );
            }
            SessionEvent::SyncUpdate(update) => println!("Sync update: {update}"),
            SessionEvent::ServerError(message) => eprintln!("Server error: {message}"),
            SessionEvent::Disconnected(reason) => println!("Disconnected: {reason}"),
        }
    }
}
