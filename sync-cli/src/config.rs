//! Configuration management for tether.
//!
//! Settings come from `config.toml` in the config directory, then the
//! environment, then command-line flags (highest priority). The session
//! token lives in `credentials.json`, written by the login flow.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tether_sync_types::DeviceType;

/// Name of the settings file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Name of the credentials file inside the config directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Environment variable overriding the server address.
pub const ENV_SERVER: &str = "TETHER_SERVER";

/// Environment variable overriding the session token.
pub const ENV_TOKEN: &str = "TETHER_TOKEN";

/// Environment variable overriding the config directory.
pub const ENV_CONFIG_DIR: &str = "TETHER_CONFIG_DIR";

/// Root configuration for tether.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Session timing.
    #[serde(default)]
    pub session: SessionSettings,
    /// Device metadata announced on connect.
    #[serde(default)]
    pub device: DeviceSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `host:port` of the sync server.
    pub address: Option<String>,
}

/// Session timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Seconds between heartbeats (default: 30).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Seconds allowed for opening the socket (default: 10).
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
}

/// Device configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Kind of device (default: desktop).
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
    /// Device name (default: host name).
    pub name: Option<String>,
}

// Default value functions
fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_dial_timeout_secs() -> u64 {
    10
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
        }
    }
}

impl SessionSettings {
    /// Heartbeat interval, never below one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Dial timeout, never below one second.
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs.max(1))
    }
}

impl Config {
    /// Load `config.toml` from `dir`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::ReadError { path, source }),
        };
        toml::from_str(&content).map_err(|source| ConfigError::ParseError { path, source })
    }

    /// Server address: flag, then `TETHER_SERVER`, then the file.
    pub fn server_address(&self, flag: Option<&str>) -> Result<String, ConfigError> {
        pick(flag, std::env::var(ENV_SERVER).ok(), self.server.address.as_deref())
            .ok_or(ConfigError::MissingServer)
    }

    /// Device type: flag, then the file.
    pub fn device_type(&self, flag: Option<DeviceType>) -> DeviceType {
        flag.unwrap_or(self.device.device_type)
    }

    /// Device name: flag, then the file, then the host name.
    pub fn device_name(&self, flag: Option<&str>) -> String {
        pick(flag, None, self.device.name.as_deref()).unwrap_or_else(host_name)
    }
}

/// First non-empty value among flag, environment and file.
fn pick(flag: Option<&str>, env: Option<String>, file: Option<&str>) -> Option<String> {
    let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
    flag.and_then(non_empty)
        .or_else(|| env.as_deref().and_then(non_empty))
        .or_else(|| file.and_then(non_empty))
}

fn host_name() -> String {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown-device".to_string())
}

/// Credentials written by the login flow.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Session token.
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Load `credentials.json` from `dir`, if present.
    pub async fn load(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(CREDENTIALS_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::ReadError { path, source }),
        };
        let credentials: Self = serde_json::from_str(&content)
            .map_err(|source| ConfigError::CredentialsError { path, source })?;
        Ok(Some(credentials).filter(|c| !c.token.trim().is_empty()))
    }
}

/// Session token: `TETHER_TOKEN`, then `credentials.json`.
///
/// # Errors
///
/// [`ConfigError::MissingToken`] when neither is available.
pub async fn resolve_token(dir: &Path) -> Result<String, ConfigError> {
    if let Some(token) = std::env::var(ENV_TOKEN).ok().filter(|t| !t.trim().is_empty()) {
        return Ok(token);
    }
    match Credentials::load(dir).await? {
        Some(credentials) => Ok(credentials.token),
        None => Err(ConfigError::MissingToken {
            path: dir.join(CREDENTIALS_FILE),
        }),
    }
}

/// Config directory: flag, then `TETHER_CONFIG_DIR`, then the platform default.
pub fn config_dir(flag: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Some(dir) = std::env::var_os(ENV_CONFIG_DIR).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let dirs =
        directories::ProjectDirs::from("io", "tether", "tether").ok_or(ConfigError::NoHomeDir)?;
    Ok(dirs.config_dir().to_path_buf())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse `config.toml`.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// `credentials.json` is not valid.
    #[error("invalid credentials file {path}: {source}")]
    CredentialsError {
        /// Path to the credentials file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// No session token anywhere.
    #[error("not logged in: no session token in $TETHER_TOKEN or {path}")]
    MissingToken {
        /// Where the credentials file was expected.
        path: PathBuf,
    },
    /// No server address anywhere.
    #[error("no server address: pass --server, set $TETHER_SERVER, or set [server] address in config.toml")]
    MissingServer,
    /// Platform config directory unavailable.
    #[error("could not determine home directory; pass --config-dir")]
    NoHomeDir,
}
