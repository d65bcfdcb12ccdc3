#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # masterlink-server
//!
//! A lightweight, in-memory UDP master server for peer-to-peer game
//! networking: peer discovery (announce ping/pong), lobby creation and
//! membership, a dedicated-gameserver directory, and a P2P relay for
//! three transport sub-protocols. One datagram in, at most a handful of
//! datagrams out — no persistence, no reliable delivery, no NAT
//! traversal beyond plain relay.

/// Layered configuration: compiled defaults, an optional config file,
/// environment variable overrides.
pub mod config;

/// Per-datagram routing: selects a handler by payload discriminator and
/// fans out the resulting recipient list.
pub mod dispatch;

/// Error taxonomy shared by every subsystem.
pub mod error;

/// Lobby manager: create/update/delete, membership, queries, chat.
pub mod lobby;

/// Structured logging initialization.
pub mod logging;

/// In-process counters, snapshotted by the reaper every sweep.
pub mod metrics;

/// The wire envelope, its payload catalog, and the MessagePack codec.
pub mod protocol;

/// Periodic lifecycle sweep: peers, lobbies, gameservers, relay connections.
pub mod reaper;

/// Concurrent directories keyed by application: peers and gameservers.
pub mod registry;

/// Peer-to-peer relay connection manager.
pub mod relay;

/// Typed outbound message helpers (pong, lobby fan-out, relay forwards).
pub mod sender;

/// `MasterServer`: owns every subsystem and drives the receive loop.
pub mod server;

/// UDP socket wrapper: one datagram in, one datagram out.
pub mod transport;
