//! The wire envelope and its payload catalog.
//!
//! Every datagram carries exactly one [`CommonMessage`]: a source peer-id,
//! a destination peer-id (zero means unspecified), and one
//! [`MessagePayload`] variant. The catalog here is the subset of the
//! externally-defined message schema this core interprets; variants the
//! core only logs and drops still round-trip byte-for-byte through their
//! opaque inner payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{ApplicationId, LobbyKind, PeerId, RoomId, ServerId};

/// Byte-keyed, byte-valued metadata map used by lobbies, lobby members,
/// and query filters alike.
pub type MetadataMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// The outer tagged union every datagram carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonMessage {
    pub source_id: PeerId,
    /// Zero means unspecified (server-originated or broadcast fan-out).
    pub dest_id: PeerId,
    pub payload: MessagePayload,
}

impl CommonMessage {
    pub fn new(source_id: PeerId, dest_id: PeerId, payload: MessagePayload) -> Self {
        Self {
            source_id,
            dest_id,
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

/// Discriminator the dispatcher switches on. Kept separate from the enum
/// itself so logging and metrics can name a variant without matching its
/// (possibly large) payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Announce,
    LowLevel,
    Lobby,
    LobbyMessages,
    Gameserver,
    Friend,
    AuthTicket,
    FriendMessages,
    NetworkChanneled,
    NetworkLegacy,
    NetworkingSockets,
    NetworkingMessages,
    SteamMessages,
    GameserverStats,
    Leaderboards,
    UserStats,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageKind::Announce => "announce",
            MessageKind::LowLevel => "low_level",
            MessageKind::Lobby => "lobby",
            MessageKind::LobbyMessages => "lobby_messages",
            MessageKind::Gameserver => "gameserver",
            MessageKind::Friend => "friend",
            MessageKind::AuthTicket => "auth_ticket",
            MessageKind::FriendMessages => "friend_messages",
            MessageKind::NetworkChanneled => "network_channeled",
            MessageKind::NetworkLegacy => "network_legacy",
            MessageKind::NetworkingSockets => "networking_sockets",
            MessageKind::NetworkingMessages => "networking_messages",
            MessageKind::SteamMessages => "steam_messages",
            MessageKind::GameserverStats => "gameserver_stats",
            MessageKind::Leaderboards => "leaderboards",
            MessageKind::UserStats => "user_stats",
        };
        f.write_str(s)
    }
}

/// The full payload catalog. Handlers the dispatcher recognizes
/// meaningfully are documented per-variant; the rest are logged and
/// dropped without disturbing live peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagePayload {
    Announce(AnnouncePayload),
    LowLevel(LowLevelPayload),
    Lobby(LobbyPayload),
    LobbyMessages(LobbyMessagePayload),
    Gameserver(GameserverPayload),
    /// No-op: friend list handling is an external collaborator concern.
    Friend(OpaquePayload),
    /// No-op: authentication-ticket validation is an external collaborator concern.
    AuthTicket(OpaquePayload),
    /// No-op: friend presence/messaging is an external collaborator concern.
    FriendMessages(OpaquePayload),
    NetworkChanneled(ChanneledPayload),
    /// Reserved for future implementation: logged only, never relayed.
    NetworkLegacy(LegacyPayload),
    NetworkingSockets(SocketsPayload),
    NetworkingMessages(MessagesPayload),
    /// No-op: Steam-specific messaging external to this core.
    SteamMessages(OpaquePayload),
    /// No-op: stats/achievements storage is an external collaborator concern.
    GameserverStats(OpaquePayload),
    /// No-op: leaderboard storage is an external collaborator concern.
    Leaderboards(OpaquePayload),
    /// No-op: user stats storage is an external collaborator concern.
    UserStats(OpaquePayload),
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::Announce(_) => MessageKind::Announce,
            MessagePayload::LowLevel(_) => MessageKind::LowLevel,
            MessagePayload::Lobby(_) => MessageKind::Lobby,
            MessagePayload::LobbyMessages(_) => MessageKind::LobbyMessages,
            MessagePayload::Gameserver(_) => MessageKind::Gameserver,
            MessagePayload::Friend(_) => MessageKind::Friend,
            MessagePayload::AuthTicket(_) => MessageKind::AuthTicket,
            MessagePayload::FriendMessages(_) => MessageKind::FriendMessages,
            MessagePayload::NetworkChanneled(_) => MessageKind::NetworkChanneled,
            MessagePayload::NetworkLegacy(_) => MessageKind::NetworkLegacy,
            MessagePayload::NetworkingSockets(_) => MessageKind::NetworkingSockets,
            MessagePayload::NetworkingMessages(_) => MessageKind::NetworkingMessages,
            MessagePayload::SteamMessages(_) => MessageKind::SteamMessages,
            MessagePayload::GameserverStats(_) => MessageKind::GameserverStats,
            MessagePayload::Leaderboards(_) => MessageKind::Leaderboards,
            MessagePayload::UserStats(_) => MessageKind::UserStats,
        }
    }
}

/// Payload the core never interprets; carried only so decode/encode
/// round-trips for variants that are recognized but handled as no-ops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpaquePayload {
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------
// Announce (discovery ping/pong)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnnouncePayload {
    /// Sent by a peer to announce itself and discover others in its
    /// application. Carries the fields the peer registry needs to upsert
    /// the sender: its own `application_id` and the TCP port it accepts
    /// companion connections on (the UDP endpoint itself comes from the
    /// datagram's source address, not from the payload).
    Ping {
        application_id: ApplicationId,
        tcp_port: u16,
    },
    /// Sent by the server in response to a ping, carrying the current
    /// peer list for the pinging peer's application (excluding itself).
    Pong { peers: Vec<AnnouncedPeer> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncedPeer {
    pub peer_id: PeerId,
    /// Big-endian-packed IPv4 address (see [`super::types::ip_to_be_u32`]).
    pub ip: u32,
    pub udp_port: u16,
    pub application_id: ApplicationId,
}

// ---------------------------------------------------------------------
// Low-level (heartbeat/connect/disconnect)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LowLevelPayload {
    /// Refreshes `last_seen` for an already-registered peer. Does not
    /// auto-register — an unknown sender is silently ignored.
    Heartbeat,
    /// Observational only; logged, does not create a peer record.
    Connect,
    /// Observational only; logged. Peer removal always happens via the
    /// reaper's timeout sweep, never eagerly here.
    Disconnect,
}

// ---------------------------------------------------------------------
// Lobby (create/update/delete/query)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LobbyPayload {
    /// Create-or-replace a lobby (`room_id != 0`). If `deleted` is set the
    /// manager marks the existing entry deleted instead of replacing it.
    Upsert(LobbyRecord),
    /// Query payload; always carries `room_id == 0`.
    Query(LobbyQuery),
    /// One result message per surviving lobby, sent back to the querying peer.
    QueryResult(LobbyRecord),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyRecord {
    pub room_id: RoomId,
    pub application_id: ApplicationId,
    /// Zero means "use the sender's peer-id" — filled in by the dispatcher.
    pub owner: PeerId,
    pub kind: LobbyKind,
    /// Zero means unbounded.
    pub member_limit: u32,
    pub joinable: bool,
    pub metadata: MetadataMap,
    pub deleted: bool,
    pub has_gameserver: bool,
    pub member_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyQuery {
    pub application_id: ApplicationId,
    pub filters: MetadataMap,
}

// ---------------------------------------------------------------------
// Lobby-messages (join/leave/change-owner/member-data/chat)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyMessageKind {
    Join,
    Leave,
    ChangeOwner,
    MemberData,
    Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyMessagePayload {
    pub kind: LobbyMessageKind,
    pub room_id: RoomId,
    /// `idata`: the new owner for change-owner, otherwise unused.
    pub target_peer: Option<PeerId>,
    pub metadata: Option<MetadataMap>,
    #[serde(with = "serde_bytes", default)]
    pub chat_data: Vec<u8>,
}

// ---------------------------------------------------------------------
// Gameserver (register/update/offline)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameserverPayload {
    /// Register-or-update; subsequent registrations with the same id
    /// replace the descriptor in place.
    Register(GameserverRecord),
    Offline { server_id: ServerId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameserverRecord {
    pub server_id: ServerId,
    pub application_id: ApplicationId,
    pub name: String,
    pub map: String,
    pub current_players: u32,
    pub max_players: u32,
    /// Packed the same way as the announce-pong peer-list IP field.
    pub public_ip: u32,
    pub game_port: u16,
    pub query_port: u16,
    pub dedicated: bool,
    pub secure: bool,
    pub password_protected: bool,
    pub metadata: MetadataMap,
}

// ---------------------------------------------------------------------
// Relay: network-channeled (ISteamNetworking)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChanneledPayload {
    Data {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    /// Bounces back to the source; never forwarded to the destination.
    FailedConnect,
}

// ---------------------------------------------------------------------
// Relay: legacy (reserved, log-only)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LegacyPayload {
    ConnectionRequest,
    Accepted,
    End,
    Data {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
}

// ---------------------------------------------------------------------
// Relay: networking-sockets (stream-oriented)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SocketsPayload {
    Request {
        virtual_port: u16,
    },
    Accepted {
        virtual_port: u16,
    },
    Data {
        virtual_port: u16,
        message_number: u64,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    End {
        virtual_port: u16,
    },
}

// ---------------------------------------------------------------------
// Relay: networking-messages (message-oriented)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagesPayload {
    New {
        channel: u32,
    },
    Accept {
        channel: u32,
    },
    Data {
        channel: u32,
        /// Opaque sender identity carried by this sub-protocol; forwarded
        /// unchanged alongside the envelope's own `source_id`.
        from: PeerId,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    End {
        channel: u32,
    },
}
