//! In-process observability. Plain atomic
//! counters updated by the same code paths that mutate registry state;
//! no HTTP or Prometheus exposition exists here — the wire protocol is
//! UDP-only and this crate has no outward-facing surface to render them
//! on. The reaper logs a snapshot of these counters every sweep.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters, owned by `MasterServer` behind an `Arc` and
/// shared read/write across every dispatch task.
#[derive(Default)]
pub struct ServerMetrics {
    peers_registered_total: AtomicU64,
    lobbies_upserted_total: AtomicU64,
    gameservers_registered_total: AtomicU64,
    gameservers_offline_total: AtomicU64,
    relay_packets_total: AtomicU64,
    relay_bytes_total: AtomicU64,
    reaper_sweeps_total: AtomicU64,
}

/// Snapshot suitable for a single structured log line.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub peers_registered_total: u64,
    pub lobbies_upserted_total: u64,
    pub gameservers_registered_total: u64,
    pub gameservers_offline_total: u64,
    pub relay_packets_total: u64,
    pub relay_bytes_total: u64,
    pub reaper_sweeps_total: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_registered(&self) {
        self.peers_registered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lobby_upserted(&self) {
        self.lobbies_upserted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gameserver_registered(&self) {
        self.gameservers_registered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gameserver_offline(&self) {
        self.gameservers_offline_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_relayed(&self, bytes: usize) {
        self.relay_packets_total.fetch_add(1, Ordering::Relaxed);
        self.relay_bytes_total.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn reaper_sweep(&self) {
        self.reaper_sweeps_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            peers_registered_total: self.peers_registered_total.load(Ordering::Relaxed),
            lobbies_upserted_total: self.lobbies_upserted_total.load(Ordering::Relaxed),
            gameservers_registered_total: self.gameservers_registered_total.load(Ordering::Relaxed),
            gameservers_offline_total: self.gameservers_offline_total.load(Ordering::Relaxed),
            relay_packets_total: self.relay_packets_total.load(Ordering::Relaxed),
            relay_bytes_total: self.relay_bytes_total.load(Ordering::Relaxed),
            reaper_sweeps_total: self.reaper_sweeps_total.load(Ordering::Relaxed),
        }
    }
}
