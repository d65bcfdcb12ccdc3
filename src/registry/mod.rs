//! Concurrent directories keyed by application: connected peers and
//! registered dedicated servers.

pub mod gameserver;
pub mod peer;

pub use gameserver::{GameserverFilter, GameserverRegistry};
pub use peer::{PeerInfo, PeerRegistry};
