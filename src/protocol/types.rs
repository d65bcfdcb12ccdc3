//! Identifiers and small value types shared across the wire protocol and
//! every registry. Every id is a newtype over the integer the wire format
//! actually carries, so a peer-id can never be passed where a room-id was
//! expected.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Stable, client-supplied identity of a peer (client or dedicated server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

/// Opaque identifier partitioning peers, lobbies, gameservers, and relay
/// connections into isolated populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u32);

/// Client-chosen lobby identity. Room-id zero is reserved: it never names
/// a lobby, it signals a query payload (see `protocol::messages::LobbyPayload`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub u64);

/// Client-chosen dedicated-server identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub u64);

/// Connection identity assigned by the relay manager itself, never by peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RoomId {
    /// Room-id zero never names a lobby; it signals a query payload.
    pub fn is_query(self) -> bool {
        self.0 == 0
    }
}

/// Opaque lobby kind (public / private / friends-only / invisible). The
/// core never interprets these beyond equality comparison against a
/// query's `lobby_type` filter, so it is modeled as the raw wire integer
/// rather than an enum the core would have to keep in sync with an
/// external catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyKind(pub u32);

/// Relay transport kind. Determines which per-pair connection the relay
/// manager indexes and which sub-protocol forwarding rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// ISteamNetworking-style channeled transport.
    Channeled,
    /// Reserved for future implementation; handler logs only, never relays.
    Legacy,
    /// NetworkingSockets-style stream-oriented transport.
    StreamOriented,
    /// NetworkingMessages-style message-oriented transport.
    MessageOriented,
}

/// Relay connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnecting,
    Closed,
}

/// Packs an IPv4 address into the big-endian `u32` encoding the wire
/// protocol uses inside the announce-pong peer list, regardless of host
/// byte order: `byte[0] << 24 | byte[1] << 16 | byte[2] << 8 | byte[3]`.
pub fn ip_to_be_u32(ip: Ipv4Addr) -> u32 {
    u32::from_be_bytes(ip.octets())
}

/// Inverse of [`ip_to_be_u32`].
pub fn ip_from_be_u32(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_encoding_matches_big_endian_octets() {
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        assert_eq!(ip_to_be_u32(ip), 0x0A00_0005);
        assert_eq!(ip_from_be_u32(0x0A00_0005), ip);
    }

    #[test]
    fn room_id_zero_is_query() {
        assert!(RoomId(0).is_query());
        assert!(!RoomId(1).is_query());
    }
}
