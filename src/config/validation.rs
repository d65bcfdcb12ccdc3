//! Configuration validation.

use super::Config;

/// Reject configurations that would put the core into a nonsensical
/// state: a zero bind port, or a zero timeout/interval anywhere the
/// reaper or discovery protocol divides by or waits on that duration.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.port == 0 {
        anyhow::bail!("port must be non-zero");
    }
    if config.peer_timeout_secs == 0 {
        anyhow::bail!("peer_timeout_secs must be non-zero");
    }
    if config.peer_cleanup_interval_secs == 0 {
        anyhow::bail!("peer_cleanup_interval_secs must be non-zero");
    }
    if config.lobby_retention_secs == 0 {
        anyhow::bail!("lobby_retention_secs must be non-zero");
    }
    if config.relay_connection_timeout_secs == 0 {
        anyhow::bail!("relay_connection_timeout_secs must be non-zero");
    }
    if config.master_server_id == 0 {
        anyhow::bail!("master_server_id must be non-zero");
    }
    Ok(())
}
