//! Lifecycle reaper: a single timer sweeping every
//! subsystem in a fixed order — peers, then lobbies, then gameservers,
//! then relay connections — so that (if a future optimization tears
//! down relay connections when their peers vanish) the ordering already
//! matches. Each subsystem's reap is independent: a panic-free failure in
//! one never prevents the others from running.

use std::time::Duration;

use crate::dispatch::DispatchContext;

/// Run one sweep across every subsystem, logging a metrics snapshot at
/// `debug` afterward.
pub fn sweep(ctx: &DispatchContext, peer_timeout: Duration, lobby_retention: Duration, relay_timeout: Duration) {
    // Each subsystem reaps independently by its own age criterion; a
    // reaped peer does not eagerly tear down its relay connections — that
    // stays the relay reaper's idle-timeout job.
    let reaped_peers = ctx.peers.reap(peer_timeout);
    let reaped_lobbies = ctx.lobbies.reap(lobby_retention);
    let reaped_gameservers = ctx.gameservers.reap();
    let reaped_connections = ctx.relays.reap(relay_timeout);

    ctx.metrics.reaper_sweep();

    tracing::debug!(
        peers_reaped = reaped_peers.len(),
        lobbies_reaped = reaped_lobbies.len(),
        gameservers_reaped = reaped_gameservers.len(),
        connections_reaped = reaped_connections.len(),
        snapshot = ?ctx.metrics.snapshot(),
        "reaper sweep complete"
    );
}

/// Run `sweep` on a `tokio::time::interval` until `shutdown` resolves.
pub async fn run(
    ctx: std::sync::Arc<DispatchContext>,
    interval: Duration,
    peer_timeout: Duration,
    lobby_retention: Duration,
    relay_timeout: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep(&ctx, peer_timeout, lobby_retention, relay_timeout);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("reaper shutting down");
                    break;
                }
            }
        }
    }
}
