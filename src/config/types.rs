//! Root configuration type.

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_gameserver_timeout_secs, default_lobby_retention_secs, default_master_server_id,
    default_peer_cleanup_interval_secs, default_peer_timeout_secs,
    default_relay_connection_timeout_secs, default_port,
};
use super::logging::{LogLevel, LoggingConfig};

/// Root configuration struct. Every field is independently defaultable so
/// a config file may set only the options it cares to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// UDP bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Max age of a peer's last-seen timestamp before the reaper removes it.
    #[serde(default = "default_peer_timeout_secs")]
    pub peer_timeout_secs: u64,

    /// Reaper tick interval.
    #[serde(default = "default_peer_cleanup_interval_secs")]
    pub peer_cleanup_interval_secs: u64,

    /// Time a deleted lobby is kept before the reaper removes it.
    #[serde(default = "default_lobby_retention_secs")]
    pub lobby_retention_secs: u64,

    /// Reserved; not used by the gameserver reap policy (see DESIGN.md).
    #[serde(default = "default_gameserver_timeout_secs")]
    pub gameserver_timeout_secs: u64,

    /// Idle age before a relay connection is closed.
    #[serde(default = "default_relay_connection_timeout_secs")]
    pub relay_connection_timeout_secs: u64,

    /// 64-bit identity placed in `source_id` for server-originated messages.
    #[serde(default = "default_master_server_id")]
    pub master_server_id: u64,

    /// Minimum level for diagnostics.
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            peer_timeout_secs: default_peer_timeout_secs(),
            peer_cleanup_interval_secs: default_peer_cleanup_interval_secs(),
            lobby_retention_secs: default_lobby_retention_secs(),
            gameserver_timeout_secs: default_gameserver_timeout_secs(),
            relay_connection_timeout_secs: default_relay_connection_timeout_secs(),
            master_server_id: default_master_server_id(),
            log_level: LogLevel::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn peer_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.peer_timeout_secs)
    }

    pub fn peer_cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.peer_cleanup_interval_secs)
    }

    pub fn lobby_retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.lobby_retention_secs)
    }

    pub fn relay_connection_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.relay_connection_timeout_secs)
    }
}
