//! Error taxonomy for the core coordination and relay engine.
//!
//! Every variant here corresponds to one of the error kinds the core
//! distinguishes: decode failures, unknown senders, invalid entity
//! registrations, missing relay/lobby targets, send failures, and fatal
//! startup errors. None of these cross the wire back to a client — the
//! protocol defines no negative acknowledgement, so these exist purely
//! for logging and internal control flow.

use thiserror::Error;

use crate::protocol::{ConnectionId, PeerId, RoomId, ServerId};

/// Non-fatal and fatal error conditions recognized by the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The envelope could not be decoded, or decoded to an empty/unknown variant.
    #[error("failed to decode envelope: {0}")]
    Decode(String),

    /// A handler required a known sender but `source_id` was not registered.
    #[error("unknown sender peer {0}")]
    UnknownSender(PeerId),

    /// A registration carried a zero-valued required identifier.
    #[error("invalid entity registration: {0}")]
    InvalidEntity(&'static str),

    /// A lobby operation referenced a room that does not exist.
    #[error("lobby {0} not found")]
    UnknownLobby(RoomId),

    /// A relay operation referenced a destination peer that is not registered.
    #[error("relay destination peer {0} not found")]
    UnknownDestination(PeerId),

    /// A gameserver lookup referenced a server id that is not registered.
    #[error("gameserver {0} not found")]
    UnknownGameserver(ServerId),

    /// A relay operation referenced a connection id that no longer exists.
    #[error("relay connection {0} not found")]
    UnknownConnection(ConnectionId),

    /// An outbound datagram send failed.
    #[error("send to {addr} failed: {source}")]
    Send {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Unrecoverable startup or transport error; the process must terminate.
    #[error("fatal error: {0}")]
    Fatal(String),
}
