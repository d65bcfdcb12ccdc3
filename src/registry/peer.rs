//! Per-application peer registry with heartbeat-based liveness.
//!
//! One concurrent map per application, nested inside a concurrent outer
//! map — both layers are `DashMap`, so no external lock is required for
//! the hot path (§5 of the design doc). A peer-id appears in at most one
//! per-application bucket at any moment.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::CoreError;
use crate::protocol::{ApplicationId, PeerId};

/// Snapshot of a registered peer, safe to hand out after the registry
/// lock (if any, for the shard in question) has been released.
#[derive(Debug, Clone, Copy)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub application_id: ApplicationId,
    pub endpoint: SocketAddr,
    pub tcp_port: u16,
}

struct Peer {
    endpoint: SocketAddr,
    tcp_port: u16,
    last_seen: Instant,
}

/// Global index of active peers, partitioned by application.
pub struct PeerRegistry {
    by_app: DashMap<ApplicationId, DashMap<PeerId, Peer>>,
    /// peer-id -> application-id, for the app-agnostic `get()` lookup.
    app_of: DashMap<PeerId, ApplicationId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            by_app: DashMap::new(),
            app_of: DashMap::new(),
        }
    }

    /// Validate, then place the peer in its application bucket, refreshing
    /// endpoint, TCP port, and `last_seen`. Moves the peer between
    /// application buckets if its reported application changed.
    pub fn upsert(
        &self,
        peer_id: PeerId,
        application_id: ApplicationId,
        endpoint: SocketAddr,
        tcp_port: u16,
    ) -> Result<(), CoreError> {
        if peer_id.0 == 0 {
            return Err(CoreError::InvalidEntity("peer_id must be non-zero"));
        }
        if application_id.0 == 0 {
            return Err(CoreError::InvalidEntity("application_id must be non-zero"));
        }

        if let Some(prev_app) = self.app_of.get(&peer_id).map(|e| *e.value()) {
            if prev_app != application_id {
                if let Some(bucket) = self.by_app.get(&prev_app) {
                    bucket.remove(&peer_id);
                }
            }
        }

        let bucket = self.by_app.entry(application_id).or_default();
        bucket.insert(
            peer_id,
            Peer {
                endpoint,
                tcp_port,
                last_seen: Instant::now(),
            },
        );
        self.app_of.insert(peer_id, application_id);
        Ok(())
    }

    /// Refresh `last_seen` for an already-registered peer. Returns `false`
    /// without side effects if the peer is unknown — heartbeats never
    /// auto-register.
    pub fn touch(&self, peer_id: PeerId) -> bool {
        let Some(app) = self.app_of.get(&peer_id).map(|e| *e.value()) else {
            return false;
        };
        if let Some(bucket) = self.by_app.get(&app) {
            if let Some(mut peer) = bucket.get_mut(&peer_id) {
                peer.last_seen = Instant::now();
                return true;
            }
        }
        false
    }

    /// Global lookup ignoring application.
    pub fn get(&self, peer_id: PeerId) -> Option<PeerInfo> {
        let app = *self.app_of.get(&peer_id)?.value();
        let bucket = self.by_app.get(&app)?;
        let peer = bucket.get(&peer_id)?;
        Some(PeerInfo {
            peer_id,
            application_id: app,
            endpoint: peer.endpoint,
            tcp_port: peer.tcp_port,
        })
    }

    /// Snapshot of every peer in `application_id` except `exclude`. Safe
    /// to call while other threads concurrently mutate the registry:
    /// `DashMap::iter` locks one shard at a time rather than the whole map.
    pub fn list(&self, application_id: ApplicationId, exclude: PeerId) -> Vec<PeerInfo> {
        let Some(bucket) = self.by_app.get(&application_id) else {
            return Vec::new();
        };
        bucket
            .iter()
            .filter(|entry| *entry.key() != exclude)
            .map(|entry| PeerInfo {
                peer_id: *entry.key(),
                application_id,
                endpoint: entry.value().endpoint,
                tcp_port: entry.value().tcp_port,
            })
            .collect()
    }

    pub fn count(&self, application_id: ApplicationId) -> usize {
        self.by_app
            .get(&application_id)
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }

    /// Remove peers whose `last_seen` is older than `timeout`. Returns the
    /// removed ids so the caller can, e.g., tear down relay connections.
    pub fn reap(&self, timeout: Duration) -> Vec<PeerId> {
        let now = Instant::now();
        let mut removed = Vec::new();

        for bucket in self.by_app.iter() {
            let expired: Vec<PeerId> = bucket
                .value()
                .iter()
                .filter(|entry| now.duration_since(entry.value().last_seen) > timeout)
                .map(|entry| *entry.key())
                .collect();

            for peer_id in expired {
                bucket.value().remove(&peer_id);
                self.app_of.remove(&peer_id);
                removed.push(peer_id);
            }
        }

        removed
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), port)
    }

    #[test]
    fn upsert_rejects_zero_ids() {
        let reg = PeerRegistry::new();
        assert!(reg.upsert(PeerId(0), ApplicationId(730), addr(1), 1).is_err());
        assert!(reg.upsert(PeerId(1), ApplicationId(0), addr(1), 1).is_err());
    }

    #[test]
    fn discovery_round_trip_s1() {
        let reg = PeerRegistry::new();
        reg.upsert(PeerId(1001), ApplicationId(730), addr(40000), 0)
            .unwrap();
        assert!(reg.list(ApplicationId(730), PeerId(1001)).is_empty());

        reg.upsert(PeerId(1002), ApplicationId(730), addr(40001), 0)
            .unwrap();

        let seen_by_1002 = reg.list(ApplicationId(730), PeerId(1002));
        assert_eq!(seen_by_1002.len(), 1);
        assert_eq!(seen_by_1002[0].peer_id, PeerId(1001));

        let seen_by_1001 = reg.list(ApplicationId(730), PeerId(1001));
        assert_eq!(seen_by_1001.len(), 1);
        assert_eq!(seen_by_1001[0].peer_id, PeerId(1002));
    }

    #[test]
    fn touch_is_idempotent_refresh_not_discovery() {
        let reg = PeerRegistry::new();
        assert!(!reg.touch(PeerId(42)));
        reg.upsert(PeerId(42), ApplicationId(1), addr(1), 0).unwrap();
        assert!(reg.touch(PeerId(42)));
    }

    #[test]
    fn reap_removes_only_stale_peers() {
        let reg = PeerRegistry::new();
        reg.upsert(PeerId(1), ApplicationId(1), addr(1), 0).unwrap();
        std::thread::sleep(Duration::from_millis(15));
        reg.upsert(PeerId(2), ApplicationId(1), addr(2), 0).unwrap();

        let removed = reg.reap(Duration::from_millis(10));
        assert_eq!(removed, vec![PeerId(1)]);
        assert!(reg.get(PeerId(1)).is_none());
        assert!(reg.get(PeerId(2)).is_some());
    }

    #[test]
    fn reap_twice_is_idempotent() {
        let reg = PeerRegistry::new();
        reg.upsert(PeerId(1), ApplicationId(1), addr(1), 0).unwrap();
        std::thread::sleep(Duration::from_millis(15));

        let first = reg.reap(Duration::from_millis(10));
        let second = reg.reap(Duration::from_millis(10));
        assert_eq!(first, vec![PeerId(1)]);
        assert!(second.is_empty());
    }

    #[test]
    fn concurrent_registrations_are_all_observed() {
        use std::sync::Arc;
        use std::thread;

        let reg = Arc::new(PeerRegistry::new());
        let mut handles = Vec::new();
        for i in 1..=200u64 {
            let reg = reg.clone();
            handles.push(thread::spawn(move || {
                reg.upsert(PeerId(i), ApplicationId(730), addr(40000), 0)
                    .unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(reg.count(ApplicationId(730)), 200);
        for i in 1..=200u64 {
            assert_eq!(reg.list(ApplicationId(730), PeerId(i)).len(), 199);
        }
    }
}
