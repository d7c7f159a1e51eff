//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section is `#[serde(default)]`
//! so a partial file only needs the keys it changes.

use std::path::PathBuf;

use rollcall_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollcallSettings {
    /// Network and WebSocket settings.
    pub server: ServerSettings,
    /// Token signing settings.
    pub auth: AuthSettings,
    /// Directory store location.
    pub storage: StorageSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl RollcallSettings {
    /// Reject combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "server.heartbeatIntervalSecs",
                reason: "must be positive",
            });
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::Invalid {
                key: "server.heartbeatTimeoutSecs",
                reason: "must not be shorter than the heartbeat interval",
            });
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::Invalid {
                key: "server.sendQueueCapacity",
                reason: "must be positive",
            });
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(SettingsError::Invalid {
                key: "auth.jwtSecret",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Network and WebSocket settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which a connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before drops.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
        }
    }
}

/// Token signing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 shared secret.
    pub jwt_secret: String,
    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: u64,
}

/// Secret used when nothing is configured. Fine for local use only.
pub const DEV_JWT_SECRET: &str = "secret";

impl AuthSettings {
    /// Whether the development secret is still in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 86_400,
        }
    }
}

/// Directory store location.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Path of the `SQLite` database file.
    pub db_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: crate::loader::rollcall_home().join("rollcall.db"),
        }
    }
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `rollcall_server=debug`.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
