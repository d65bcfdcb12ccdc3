//! Default value functions, referenced from `#[serde(default = "...")]`
//! attributes so every field is independently optional in the config file.

use super::logging::LogFormat;

pub fn default_port() -> u16 {
    47584
}

pub fn default_peer_timeout_secs() -> u64 {
    30
}

pub fn default_peer_cleanup_interval_secs() -> u64 {
    10
}

pub fn default_lobby_retention_secs() -> u64 {
    300
}

pub fn default_gameserver_timeout_secs() -> u64 {
    300
}

pub fn default_relay_connection_timeout_secs() -> u64 {
    300
}

pub fn default_master_server_id() -> u64 {
    0x0010_0001_DEAD_BEEF
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "master-server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub fn default_enable_file_logging() -> bool {
    false
}

pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
