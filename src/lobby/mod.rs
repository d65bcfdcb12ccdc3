//! Lobby manager: a single concurrent map of lobbies plus an auxiliary
//! peer-id -> room-set index, maintained as a pure star with no cycles
//! (GLOSSARY: Lobby). Every mutation returns the online-member recipient
//! list for the caller to broadcast against, without this module ever
//! touching the peer registry itself — "online" is decided by whoever
//! resolves each returned peer-id to a live endpoint.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry as DashEntry;
use dashmap::DashMap;

use crate::error::CoreError;
use crate::protocol::{LobbyQuery, LobbyRecord, MetadataMap, PeerId, RoomId};

/// Filter key compared as a little-endian-packed 32-bit unsigned integer
/// against the lobby's kind, rather than by byte-equality like every
/// other filter key.
const LOBBY_TYPE_FILTER_KEY: &[u8] = b"lobby_type";

const QUERY_RESULT_CAP: usize = 50;

struct Lobby {
    record: LobbyRecord,
    deleted_at: Option<Instant>,
    /// Insertion order; ownership transfer picks index 0 of the survivors.
    members: Vec<PeerId>,
    member_metadata: HashMap<PeerId, MetadataMap>,
}

/// What a lobby-messages mutation handed back to the dispatcher: who to
/// broadcast the original payload to (sender already excluded), and an
/// optional unicast of the full lobby state (join only).
pub struct LobbyMessageOutcome {
    pub broadcast_recipients: Vec<PeerId>,
    pub unicast: Option<(PeerId, LobbyRecord)>,
}

/// What an upsert handed back: who to broadcast the resulting record to.
/// Unlike lobby-messages, the upsert broadcast is not sender-excluded —
/// the owner is a member like any other and receives its own update.
pub struct UpsertOutcome {
    pub recipients: Vec<PeerId>,
    pub record: LobbyRecord,
}

pub struct LobbyManager {
    lobbies: DashMap<RoomId, Lobby>,
    peer_rooms: DashMap<PeerId, HashSet<RoomId>>,
}

impl LobbyManager {
    pub fn new() -> Self {
        Self {
            lobbies: DashMap::new(),
            peer_rooms: DashMap::new(),
        }
    }

    /// Create-or-replace (`record.room_id != 0`, already assured by the
    /// caller) or mark-deleted if `record.deleted` is set. The dispatcher
    /// is responsible for defaulting a zero owner to the sender before
    /// calling this.
    pub fn upsert(&self, mut record: LobbyRecord) -> Result<UpsertOutcome, CoreError> {
        if record.room_id.0 == 0 {
            return Err(CoreError::InvalidEntity("room_id must be non-zero"));
        }
        if record.application_id.0 == 0 {
            return Err(CoreError::InvalidEntity("application_id must be non-zero"));
        }
        if record.owner.0 == 0 {
            return Err(CoreError::InvalidEntity("lobby owner must be non-zero"));
        }

        let room_id = record.room_id;
        match self.lobbies.entry(room_id) {
            DashEntry::Occupied(mut occ) => {
                let lobby = occ.get_mut();
                if record.deleted {
                    lobby.record.deleted = true;
                    lobby.deleted_at = Some(Instant::now());
                } else {
                    record.member_count = lobby.members.len() as u32;
                    lobby.record = record;
                }
                Ok(UpsertOutcome {
                    recipients: lobby.members.clone(),
                    record: lobby.record.clone(),
                })
            }
            DashEntry::Vacant(vac) => {
                let owner = record.owner;
                record.member_count = 1;
                let snapshot = record.clone();
                vac.insert(Lobby {
                    record,
                    deleted_at: None,
                    members: vec![owner],
                    member_metadata: HashMap::new(),
                });
                self.peer_rooms.entry(owner).or_default().insert(room_id);
                Ok(UpsertOutcome {
                    recipients: vec![owner],
                    record: snapshot,
                })
            }
        }
    }

    pub fn get(&self, room_id: RoomId) -> Option<LobbyRecord> {
        self.lobbies.get(&room_id).map(|entry| entry.record.clone())
    }

    /// Survivors of `query`, sorted by descending member-count then
    /// descending "has gameserver", truncated to the result cap.
    pub fn query(&self, query: &LobbyQuery) -> Vec<LobbyRecord> {
        let mut results: Vec<LobbyRecord> = self
            .lobbies
            .iter()
            .filter(|entry| {
                let lobby = entry.value();
                lobby.record.application_id == query.application_id
                    && !lobby.record.deleted
                    && lobby.record.joinable
                    && (lobby.record.member_limit == 0
                        || (lobby.members.len() as u32) < lobby.record.member_limit)
                    && matches_filters(&lobby.record, &query.filters)
            })
            .map(|entry| entry.value().record.clone())
            .collect();

        results.sort_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then(b.has_gameserver.cmp(&a.has_gameserver))
        });
        results.truncate(QUERY_RESULT_CAP);
        results
    }

    /// Guard: lobby exists, is joinable, not deleted, not full.
    pub fn join(&self, room_id: RoomId, source: PeerId) -> Result<LobbyMessageOutcome, CoreError> {
        let mut entry = self
            .lobbies
            .get_mut(&room_id)
            .ok_or(CoreError::UnknownLobby(room_id))?;
        let lobby = entry.value_mut();
        if lobby.record.deleted || !lobby.record.joinable {
            return Err(CoreError::UnknownLobby(room_id));
        }
        if lobby.record.member_limit != 0 && lobby.members.len() as u32 >= lobby.record.member_limit {
            return Err(CoreError::UnknownLobby(room_id));
        }

        if !lobby.members.contains(&source) {
            lobby.members.push(source);
            lobby.record.member_count = lobby.members.len() as u32;
            self.peer_rooms.entry(source).or_default().insert(room_id);
        }

        let snapshot = lobby.record.clone();
        let recipients = lobby
            .members
            .iter()
            .copied()
            .filter(|peer| *peer != source)
            .collect();
        Ok(LobbyMessageOutcome {
            broadcast_recipients: recipients,
            unicast: Some((source, snapshot)),
        })
    }

    /// Guard: lobby exists. Transfers ownership to the new first member
    /// if the owner left with survivors remaining; marks the lobby
    /// deleted if the last member left.
    pub fn leave(&self, room_id: RoomId, source: PeerId) -> Result<LobbyMessageOutcome, CoreError> {
        let mut entry = self
            .lobbies
            .get_mut(&room_id)
            .ok_or(CoreError::UnknownLobby(room_id))?;
        let lobby = entry.value_mut();

        let was_owner = lobby.record.owner == source;
        lobby.members.retain(|peer| *peer != source);
        lobby.member_metadata.remove(&source);
        lobby.record.member_count = lobby.members.len() as u32;

        if lobby.members.is_empty() {
            lobby.record.deleted = true;
            lobby.deleted_at = Some(Instant::now());
        } else if was_owner {
            lobby.record.owner = lobby.members[0];
        }

        if let Some(mut rooms) = self.peer_rooms.get_mut(&source) {
            rooms.remove(&room_id);
        }

        Ok(LobbyMessageOutcome {
            broadcast_recipients: lobby.members.clone(),
            unicast: None,
        })
    }

    /// Guard: `source` is the current owner.
    pub fn change_owner(
        &self,
        room_id: RoomId,
        source: PeerId,
        new_owner: PeerId,
    ) -> Result<LobbyMessageOutcome, CoreError> {
        let mut entry = self
            .lobbies
            .get_mut(&room_id)
            .ok_or(CoreError::UnknownLobby(room_id))?;
        let lobby = entry.value_mut();
        if lobby.record.owner != source {
            return Err(CoreError::UnknownLobby(room_id));
        }
        lobby.record.owner = new_owner;

        let recipients = lobby
            .members
            .iter()
            .copied()
            .filter(|peer| *peer != source)
            .collect();
        Ok(LobbyMessageOutcome {
            broadcast_recipients: recipients,
            unicast: None,
        })
    }

    /// Guard: lobby exists and carries a metadata map. Merges into the
    /// sending member's metadata, overwriting existing keys.
    pub fn member_data(
        &self,
        room_id: RoomId,
        source: PeerId,
        metadata: MetadataMap,
    ) -> Result<LobbyMessageOutcome, CoreError> {
        let mut entry = self
            .lobbies
            .get_mut(&room_id)
            .ok_or(CoreError::UnknownLobby(room_id))?;
        let lobby = entry.value_mut();
        let slot = lobby.member_metadata.entry(source).or_default();
        slot.extend(metadata);

        let recipients = lobby
            .members
            .iter()
            .copied()
            .filter(|peer| *peer != source)
            .collect();
        Ok(LobbyMessageOutcome {
            broadcast_recipients: recipients,
            unicast: None,
        })
    }

    /// No state change; just the broadcast set.
    pub fn chat_recipients(&self, room_id: RoomId, source: PeerId) -> Result<Vec<PeerId>, CoreError> {
        let entry = self
            .lobbies
            .get(&room_id)
            .ok_or(CoreError::UnknownLobby(room_id))?;
        Ok(entry
            .members
            .iter()
            .copied()
            .filter(|peer| *peer != source)
            .collect())
    }

    /// Remove lobbies marked deleted whose deletion timestamp is older
    /// than `retention`, purging their entries from the peer-room index.
    pub fn reap(&self, retention: Duration) -> Vec<RoomId> {
        let now = Instant::now();
        let expired: Vec<RoomId> = self
            .lobbies
            .iter()
            .filter(|entry| {
                entry.value().record.deleted
                    && entry
                        .value()
                        .deleted_at
                        .is_some_and(|at| now.duration_since(at) > retention)
            })
            .map(|entry| *entry.key())
            .collect();

        for room_id in &expired {
            if let Some((_, lobby)) = self.lobbies.remove(room_id) {
                for member in lobby.members {
                    if let Some(mut rooms) = self.peer_rooms.get_mut(&member) {
                        rooms.remove(room_id);
                    }
                }
            }
        }

        expired
    }
}

impl Default for LobbyManager {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filters(record: &LobbyRecord, filters: &MetadataMap) -> bool {
    for (key, value) in filters {
        if key.as_slice() == LOBBY_TYPE_FILTER_KEY {
            let Ok(bytes) = <[u8; 4]>::try_from(value.as_slice()) else {
                return false;
            };
            if u32::from_le_bytes(bytes) != record.kind.0 {
                return false;
            }
        } else if record.metadata.get(key) != Some(value) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ApplicationId, LobbyKind};

    fn base_record(room_id: u64, owner: u64) -> LobbyRecord {
        LobbyRecord {
            room_id: RoomId(room_id),
            application_id: ApplicationId(730),
            owner: PeerId(owner),
            kind: LobbyKind(0),
            member_limit: 4,
            joinable: true,
            metadata: MetadataMap::from([(b"map".to_vec(), b"A".to_vec())]),
            deleted: false,
            has_gameserver: false,
            member_count: 0,
        }
    }

    #[test]
    fn upsert_rejects_zero_owner() {
        let mgr = LobbyManager::new();
        let mut record = base_record(5000, 0);
        record.owner = PeerId(0);
        assert!(mgr.upsert(record).is_err());
    }

    #[test]
    fn create_join_query_scenario_s2() {
        let mgr = LobbyManager::new();
        let outcome = mgr.upsert(base_record(5000, 1001)).unwrap();
        assert_eq!(outcome.recipients, vec![PeerId(1001)]);

        mgr.join(RoomId(5000), PeerId(1002)).unwrap();
        mgr.join(RoomId(5000), PeerId(1003)).unwrap();

        let query_a = LobbyQuery {
            application_id: ApplicationId(730),
            filters: MetadataMap::from([(b"map".to_vec(), b"A".to_vec())]),
        };
        let results = mgr.query(&query_a);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].member_count, 3);

        let query_b = LobbyQuery {
            application_id: ApplicationId(730),
            filters: MetadataMap::from([(b"map".to_vec(), b"B".to_vec())]),
        };
        assert!(mgr.query(&query_b).is_empty());
    }

    #[test]
    fn owner_leave_transfers_to_first_remaining_member_s3() {
        let mgr = LobbyManager::new();
        mgr.upsert(base_record(5000, 1001)).unwrap();
        mgr.join(RoomId(5000), PeerId(1002)).unwrap();
        mgr.join(RoomId(5000), PeerId(1003)).unwrap();

        let outcome = mgr.leave(RoomId(5000), PeerId(1001)).unwrap();
        assert_eq!(outcome.broadcast_recipients, vec![PeerId(1002), PeerId(1003)]);
        assert_eq!(mgr.get(RoomId(5000)).unwrap().owner, PeerId(1002));

        mgr.leave(RoomId(5000), PeerId(1003)).unwrap();
        let last = mgr.leave(RoomId(5000), PeerId(1002)).unwrap();
        assert!(last.broadcast_recipients.is_empty());
        assert!(mgr.get(RoomId(5000)).unwrap().deleted);
    }

    #[test]
    fn reap_removes_only_retention_expired_deleted_lobbies() {
        let mgr = LobbyManager::new();
        mgr.upsert(base_record(5000, 1001)).unwrap();
        mgr.leave(RoomId(5000), PeerId(1001)).unwrap();
        assert!(mgr.get(RoomId(5000)).unwrap().deleted);

        assert!(mgr.reap(Duration::from_secs(300)).is_empty());
        std::thread::sleep(Duration::from_millis(15));
        let removed = mgr.reap(Duration::from_millis(10));
        assert_eq!(removed, vec![RoomId(5000)]);
        assert!(mgr.get(RoomId(5000)).is_none());
    }

    #[test]
    fn join_rejects_full_lobby() {
        let mgr = LobbyManager::new();
        let mut record = base_record(5000, 1001);
        record.member_limit = 1;
        mgr.upsert(record).unwrap();
        assert!(mgr.join(RoomId(5000), PeerId(1002)).is_err());
    }

    #[test]
    fn change_owner_rejects_non_owner() {
        let mgr = LobbyManager::new();
        mgr.upsert(base_record(5000, 1001)).unwrap();
        mgr.join(RoomId(5000), PeerId(1002)).unwrap();
        assert!(mgr.change_owner(RoomId(5000), PeerId(1002), PeerId(1002)).is_err());
        assert!(mgr.change_owner(RoomId(5000), PeerId(1001), PeerId(1002)).is_ok());
        assert_eq!(mgr.get(RoomId(5000)).unwrap().owner, PeerId(1002));
    }
}
