//! Peer-to-peer relay manager.
//!
//! `connections` is a concurrent map; `peer_index` and the connection-id
//! counter share a single mutex (GLOSSARY: Relay connection). Per
//! §5: whenever the index is read for iteration, its set is copied
//! inside the lock and iterated outside; whenever `connections` itself
//! needs clearing, that also happens under the lock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::CoreError;
use crate::protocol::{ApplicationId, ConnectionId, ConnectionState, PeerId, TransportKind};

pub struct ConnectionRecord {
    pub connection_id: ConnectionId,
    pub from: PeerId,
    pub to: PeerId,
    pub application_id: ApplicationId,
    pub kind: TransportKind,
    pub state: ConnectionState,
    pub last_activity: Instant,
    pub packets_relayed: u64,
    pub bytes_relayed: u64,
}

struct Index {
    next_id: u64,
    by_peer: HashMap<PeerId, HashSet<ConnectionId>>,
}

pub struct RelayManager {
    connections: DashMap<ConnectionId, ConnectionRecord>,
    index: Mutex<Index>,
    global_packets: AtomicU64,
    global_bytes: AtomicU64,
}

impl RelayManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            index: Mutex::new(Index {
                next_id: 0,
                by_peer: HashMap::new(),
            }),
            global_packets: AtomicU64::new(0),
            global_bytes: AtomicU64::new(0),
        }
    }

    /// Scan `peer_index[from]` for a live connection of `kind` whose
    /// endpoint pair equals `{from, to}` as an unordered pair. `None` if
    /// not found, mirroring the source's connection-id-zero sentinel.
    pub fn find(&self, from: PeerId, to: PeerId, kind: TransportKind) -> Option<ConnectionId> {
        let candidates: Vec<ConnectionId> = {
            let index = self.index.lock().unwrap();
            index
                .by_peer
                .get(&from)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };

        candidates.into_iter().find(|id| {
            self.connections.get(id).is_some_and(|record| {
                record.kind == kind
                    && ((record.from == from && record.to == to) || (record.from == to && record.to == from))
            })
        })
    }

    /// Find an existing connection and refresh its activity, or allocate
    /// a fresh one in the connecting state.
    pub fn create_or_get(
        &self,
        from: PeerId,
        to: PeerId,
        application_id: ApplicationId,
        kind: TransportKind,
    ) -> ConnectionId {
        if let Some(existing) = self.find(from, to, kind) {
            if let Some(mut record) = self.connections.get_mut(&existing) {
                record.last_activity = Instant::now();
            }
            return existing;
        }

        let connection_id = {
            let mut index = self.index.lock().unwrap();
            index.next_id += 1;
            let connection_id = ConnectionId(index.next_id);
            index.by_peer.entry(from).or_default().insert(connection_id);
            index.by_peer.entry(to).or_default().insert(connection_id);
            connection_id
        };

        self.connections.insert(
            connection_id,
            ConnectionRecord {
                connection_id,
                from,
                to,
                application_id,
                kind,
                state: ConnectionState::Connecting,
                last_activity: Instant::now(),
                packets_relayed: 0,
                bytes_relayed: 0,
            },
        );
        connection_id
    }

    pub fn transition(&self, connection_id: ConnectionId, state: ConnectionState) -> Result<(), CoreError> {
        let mut record = self
            .connections
            .get_mut(&connection_id)
            .ok_or(CoreError::UnknownConnection(connection_id))?;
        record.state = state;
        record.last_activity = Instant::now();
        Ok(())
    }

    /// Record one forwarded packet of `bytes_len` on both the connection
    /// and the global totals.
    pub fn record_forward(&self, connection_id: ConnectionId, bytes_len: usize) -> Result<(), CoreError> {
        let mut record = self
            .connections
            .get_mut(&connection_id)
            .ok_or(CoreError::UnknownConnection(connection_id))?;
        record.packets_relayed += 1;
        record.bytes_relayed += bytes_len as u64;
        record.last_activity = Instant::now();
        drop(record);

        self.global_packets.fetch_add(1, Ordering::Relaxed);
        self.global_bytes.fetch_add(bytes_len as u64, Ordering::Relaxed);
        Ok(())
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<(PeerId, PeerId, TransportKind)> {
        self.connections
            .get(&connection_id)
            .map(|record| (record.from, record.to, record.kind))
    }

    /// Remove a connection from `connections` and from both peers'
    /// `peer_index` entries.
    pub fn close(&self, connection_id: ConnectionId) -> Option<ConnectionRecord> {
        let (_, record) = self.connections.remove(&connection_id)?;

        let mut index = self.index.lock().unwrap();
        if let Some(set) = index.by_peer.get_mut(&record.from) {
            set.remove(&connection_id);
        }
        if let Some(set) = index.by_peer.get_mut(&record.to) {
            set.remove(&connection_id);
        }
        drop(index);

        tracing::debug!(
            connection_id = %connection_id,
            from = %record.from,
            to = %record.to,
            packets_relayed = record.packets_relayed,
            bytes_relayed = record.bytes_relayed,
            "relay connection closed"
        );
        Some(record)
    }

    /// Snapshot `peer_index[peer_id]` under the lock, release it, then
    /// close every connection found.
    pub fn close_for_peer(&self, peer_id: PeerId) -> Vec<ConnectionId> {
        let ids: Vec<ConnectionId> = {
            let index = self.index.lock().unwrap();
            index
                .by_peer
                .get(&peer_id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };

        let mut closed = Vec::with_capacity(ids.len());
        for id in ids {
            if self.close(id).is_some() {
                closed.push(id);
            }
        }
        closed
    }

    /// Close every connection idle longer than `timeout`.
    pub fn reap(&self, timeout: Duration) -> Vec<ConnectionId> {
        let now = Instant::now();
        let expired: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_activity) > timeout)
            .map(|entry| *entry.key())
            .collect();

        expired.into_iter().filter(|id| self.close(*id).is_some()).collect()
    }

    pub fn global_stats(&self) -> (u64, u64) {
        (
            self.global_packets.load(Ordering::Relaxed),
            self.global_bytes.load(Ordering::Relaxed),
        )
    }
}

impl Default for RelayManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_bidirectional_s4() {
        let mgr = RelayManager::new();
        let id = mgr.create_or_get(PeerId(1001), PeerId(1002), ApplicationId(730), TransportKind::StreamOriented);
        assert_eq!(mgr.find(PeerId(1001), PeerId(1002), TransportKind::StreamOriented), Some(id));
        assert_eq!(mgr.find(PeerId(1002), PeerId(1001), TransportKind::StreamOriented), Some(id));
    }

    #[test]
    fn at_most_one_connection_per_pair_and_kind() {
        let mgr = RelayManager::new();
        let first = mgr.create_or_get(PeerId(1001), PeerId(1002), ApplicationId(730), TransportKind::Channeled);
        let second = mgr.create_or_get(PeerId(1002), PeerId(1001), ApplicationId(730), TransportKind::Channeled);
        assert_eq!(first, second);
    }

    #[test]
    fn stream_oriented_lifecycle_s4() {
        let mgr = RelayManager::new();
        let id = mgr.create_or_get(PeerId(1001), PeerId(1002), ApplicationId(730), TransportKind::StreamOriented);
        assert_eq!(mgr.get(id).unwrap().2, TransportKind::StreamOriented);

        mgr.transition(id, ConnectionState::Connected).unwrap();
        mgr.record_forward(id, 128).unwrap();
        assert_eq!(mgr.global_stats(), (1, 128));

        mgr.transition(id, ConnectionState::Disconnecting).unwrap();
        mgr.close(id);
        assert!(mgr.get(id).is_none());
        assert!(mgr.record_forward(id, 64).is_err());
    }

    #[test]
    fn reap_closes_only_idle_connections() {
        let mgr = RelayManager::new();
        let stale = mgr.create_or_get(PeerId(1), PeerId(2), ApplicationId(1), TransportKind::Channeled);
        std::thread::sleep(Duration::from_millis(15));
        let fresh = mgr.create_or_get(PeerId(3), PeerId(4), ApplicationId(1), TransportKind::Channeled);

        let closed = mgr.reap(Duration::from_millis(10));
        assert_eq!(closed, vec![stale]);
        assert!(mgr.get(fresh).is_some());
    }

    #[test]
    fn close_for_peer_tears_down_every_connection() {
        let mgr = RelayManager::new();
        let a = mgr.create_or_get(PeerId(1), PeerId(2), ApplicationId(1), TransportKind::Channeled);
        let b = mgr.create_or_get(PeerId(1), PeerId(3), ApplicationId(1), TransportKind::StreamOriented);

        let mut closed = mgr.close_for_peer(PeerId(1));
        closed.sort_by_key(|id| id.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.0);
        assert_eq!(closed, expected);
    }
}
