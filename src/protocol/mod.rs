//! Wire protocol: the envelope, its payload catalog, and the codec that
//! moves between bytes and typed messages.

pub mod codec;
pub mod messages;
pub mod types;

pub use messages::{
    AnnouncePayload, AnnouncedPeer, ChanneledPayload, CommonMessage, GameserverPayload,
    GameserverRecord, LegacyPayload, LobbyMessageKind, LobbyMessagePayload, LobbyPayload,
    LobbyQuery, LobbyRecord, LowLevelPayload, MessageKind, MessagePayload, MessagesPayload,
    MetadataMap, OpaquePayload, SocketsPayload,
};
pub use types::{
    ip_from_be_u32, ip_to_be_u32, ApplicationId, ConnectionId, ConnectionState, LobbyKind, PeerId,
    RoomId, ServerId, TransportKind,
};
