//! # tether
//!
//! Command-line front end for tether sync sessions.
//!
//! ## Commands
//!
//! - `connect`: Open a session and keep it alive until interrupted
//! - `disconnect`: Ask the server to end this host's session
//! - `status`: Show whether a session is active on this host
//! - `monitor`: Watch the session status
//!
//! ## Example
//!
//! ```bash
//! # Open a session (runs until Ctrl-C)
//! TETHER_TOKEN=... tether connect --server sync.example.com:7420
//!
//! # From another terminal
//! tether status
//! tether status --json
//!
//! # End the session
//! tether disconnect
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tether_sync_types::DeviceType;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{connect, disconnect, monitor, status};

/// Command-line front end for tether sync sessions.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding config.toml, credentials and session state
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a session and keep it alive until interrupted
    Connect {
        /// Server address (host:port)
        #[arg(long)]
        server: Option<String>,

        /// Device type: mobile, desktop or web
        #[arg(long)]
        device_type: Option<DeviceType>,

        /// Device name (defaults to the host name)
        #[arg(long)]
        device_name: Option<String>,
    },

    /// Ask the server to end this host's session
    Disconnect {
        /// Server address (host:port)
        #[arg(long)]
        server: Option<String>,
    },

    /// Show whether a session is active on this host
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch the session status until interrupted
    Monitor {
        /// Seconds between checks
        #[arg(long, default_value = "5")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // The directory is created lazily by whoever writes first; status
    // never creates it.
    let config_dir = config::config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Connect {
            server,
            device_type,
            device_name,
        } => {
            let options = connect::Options {
                server,
                device_type,
                device_name,
            };
            connect::run(&config_dir, options).await?;
        }
        Commands::Disconnect { server } => {
            disconnect::run(&config_dir, server.as_deref()).await?;
        }
        Commands::Status { json } => {
            status::run(&config_dir, json).await?;
        }
        Commands::Monitor { interval } => {
            monitor::run(&config_dir, interval).await?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
