//! Dispatcher: selects a handler strictly by payload discriminator
//! Every handler that mutates registry state completes
//! its mutation, captures the recipient list, releases any subsystem
//! lock implicitly (registries never hand out guards across an await
//! point), and only then sends.

use std::net::SocketAddr;

use crate::error::CoreError;
use crate::lobby::LobbyManager;
use crate::metrics::ServerMetrics;
use crate::protocol::{
    self, AnnouncePayload, ChanneledPayload, CommonMessage, GameserverPayload, LobbyMessageKind,
    LobbyMessagePayload, LobbyPayload, LowLevelPayload, MessagePayload, MessagesPayload, PeerId,
    SocketsPayload, TransportKind,
};
use crate::registry::{GameserverRegistry, PeerRegistry};
use crate::relay::RelayManager;
use crate::sender::Sender;

/// Every subsystem a handler might need, bundled so `dispatch` stays a
/// single function with one argument list instead of five.
pub struct DispatchContext {
    pub peers: PeerRegistry,
    pub lobbies: LobbyManager,
    pub gameservers: GameserverRegistry,
    pub relays: RelayManager,
    pub sender: Sender,
    pub metrics: ServerMetrics,
}

/// Handle one decoded envelope received from `source_addr`. Never panics
/// on malformed application state; every guard failure is logged and
/// dropped — the wire protocol defines no negative acknowledgement.
pub async fn dispatch(ctx: &DispatchContext, message: CommonMessage, source_addr: SocketAddr) {
    let source_id = message.source_id;

    match message.payload {
        MessagePayload::Announce(payload) => handle_announce(ctx, source_id, source_addr, payload).await,
        MessagePayload::LowLevel(payload) => handle_low_level(ctx, source_id, payload),
        MessagePayload::Lobby(payload) => handle_lobby(ctx, source_id, payload).await,
        MessagePayload::LobbyMessages(payload) => handle_lobby_message(ctx, source_id, payload).await,
        MessagePayload::Gameserver(payload) => handle_gameserver(ctx, payload),
        MessagePayload::NetworkChanneled(payload) => {
            handle_channeled(ctx, source_id, message.dest_id, payload).await
        }
        MessagePayload::NetworkingSockets(payload) => {
            handle_sockets(ctx, source_id, message.dest_id, payload).await
        }
        MessagePayload::NetworkingMessages(payload) => {
            handle_messages(ctx, source_id, message.dest_id, payload).await
        }
        MessagePayload::NetworkLegacy(_) => {
            tracing::debug!(peer = %source_id, "legacy relay payload received; reserved, logged only");
        }
        MessagePayload::Friend(_)
        | MessagePayload::AuthTicket(_)
        | MessagePayload::FriendMessages(_)
        | MessagePayload::SteamMessages(_)
        | MessagePayload::GameserverStats(_)
        | MessagePayload::Leaderboards(_)
        | MessagePayload::UserStats(_) => {
            tracing::debug!(peer = %source_id, kind = %message.kind(), "no-op payload received; logged and dropped");
        }
    }
}

async fn handle_announce(ctx: &DispatchContext, source_id: PeerId, source_addr: SocketAddr, payload: AnnouncePayload) {
    match payload {
        AnnouncePayload::Ping {
            application_id,
            tcp_port,
        } => {
            if let Err(err) = ctx.peers.upsert(source_id, application_id, source_addr, tcp_port) {
                tracing::warn!(peer = %source_id, error = %err, "rejected announce-ping registration");
                return;
            }
            ctx.metrics.peer_registered();

            let peers = ctx
                .peers
                .list(application_id, source_id)
                .into_iter()
                .map(|info| protocol::AnnouncedPeer {
                    peer_id: info.peer_id,
                    ip: ip_of(info.endpoint),
                    udp_port: info.endpoint.port(),
                    application_id,
                })
                .collect();

            ctx.sender.send_pong(&ctx.peers, source_id, peers).await;
        }
        AnnouncePayload::Pong { .. } => {
            tracing::debug!(peer = %source_id, "unexpected announce-pong from a client; dropped");
        }
    }
}

fn ip_of(addr: SocketAddr) -> u32 {
    match addr {
        SocketAddr::V4(v4) => protocol::ip_to_be_u32(*v4.ip()),
        SocketAddr::V6(_) => 0,
    }
}

fn handle_low_level(ctx: &DispatchContext, source_id: PeerId, payload: LowLevelPayload) {
    match payload {
        LowLevelPayload::Heartbeat => {
            if !ctx.peers.touch(source_id) {
                tracing::debug!(peer = %source_id, "heartbeat from unknown peer; ignored, no auto-register");
            }
        }
        LowLevelPayload::Connect => {
            tracing::debug!(peer = %source_id, "low-level connect observed");
        }
        LowLevelPayload::Disconnect => {
            tracing::debug!(peer = %source_id, "low-level disconnect observed; peer removal deferred to the reaper");
        }
    }
}

async fn handle_lobby(ctx: &DispatchContext, source_id: PeerId, payload: LobbyPayload) {
    match payload {
        LobbyPayload::Upsert(mut record) => {
            if ctx.peers.get(source_id).is_none() {
                let err = CoreError::UnknownSender(source_id);
                tracing::warn!(peer = %source_id, error = %err, "lobby upsert dropped");
                return;
            }
            if record.owner.0 == 0 {
                record.owner = source_id;
            }
            match ctx.lobbies.upsert(record) {
                Ok(outcome) => {
                    ctx.metrics.lobby_upserted();
                    ctx.sender
                        .broadcast_lobby_record(&ctx.peers, &outcome.recipients, outcome.record)
                        .await;
                }
                Err(err) => tracing::warn!(peer = %source_id, error = %err, "rejected lobby upsert"),
            }
        }
        LobbyPayload::Query(query) => {
            for record in ctx.lobbies.query(&query) {
                ctx.sender.send_lobby_query_result(&ctx.peers, source_id, record).await;
            }
        }
        LobbyPayload::QueryResult(_) => {
            tracing::debug!(peer = %source_id, "unexpected lobby-query-result from a client; dropped");
        }
    }
}

async fn handle_lobby_message(ctx: &DispatchContext, source_id: PeerId, payload: LobbyMessagePayload) {
    if ctx.peers.get(source_id).is_none() {
        let err = CoreError::UnknownSender(source_id);
        tracing::warn!(peer = %source_id, error = %err, "lobby-message dropped");
        return;
    }

    let room_id = payload.room_id;
    let outcome = match payload.kind {
        LobbyMessageKind::Join => ctx.lobbies.join(room_id, source_id),
        LobbyMessageKind::Leave => ctx.lobbies.leave(room_id, source_id),
        LobbyMessageKind::ChangeOwner => {
            let Some(new_owner) = payload.target_peer else {
                tracing::warn!(peer = %source_id, room = %room_id, "change-owner missing target_peer; dropped");
                return;
            };
            ctx.lobbies.change_owner(room_id, source_id, new_owner)
        }
        LobbyMessageKind::MemberData => {
            let Some(metadata) = payload.metadata.clone() else {
                tracing::warn!(peer = %source_id, room = %room_id, "member-data missing metadata; dropped");
                return;
            };
            ctx.lobbies.member_data(room_id, source_id, metadata)
        }
        LobbyMessageKind::Chat => ctx
            .lobbies
            .chat_recipients(room_id, source_id)
            .map(|recipients| crate::lobby::LobbyMessageOutcome {
                broadcast_recipients: recipients,
                unicast: None,
            }),
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(peer = %source_id, room = %room_id, error = %err, "lobby-message rejected");
            return;
        }
    };

    ctx.sender
        .broadcast_lobby_message(&ctx.peers, &outcome.broadcast_recipients, source_id, payload)
        .await;

    if let Some((dest, record)) = outcome.unicast {
        ctx.sender.unicast_lobby_state(&ctx.peers, dest, source_id, record).await;
    }
}

fn handle_gameserver(ctx: &DispatchContext, payload: GameserverPayload) {
    match payload {
        GameserverPayload::Register(record) => match ctx.gameservers.register(record) {
            Ok(()) => ctx.metrics.gameserver_registered(),
            Err(err) => tracing::warn!(error = %err, "rejected gameserver registration"),
        },
        GameserverPayload::Offline { server_id } => {
            if ctx.gameservers.mark_offline(server_id) {
                ctx.metrics.gameserver_offline();
            } else {
                let err = CoreError::UnknownGameserver(server_id);
                tracing::debug!(server = %server_id, error = %err, "offline marker dropped");
            }
        }
    }
}

/// Shared relay pre-flight: the source must be a known peer and the
/// destination must be a known peer. Returns `None` (already logged) if
/// either guard fails.
fn relay_preflight(ctx: &DispatchContext, source_id: PeerId, dest_id: PeerId) -> Option<()> {
    if ctx.peers.get(source_id).is_none() {
        let err = CoreError::UnknownSender(source_id);
        tracing::warn!(peer = %source_id, error = %err, "relay payload dropped");
        return None;
    }
    if ctx.peers.get(dest_id).is_none() {
        let err = CoreError::UnknownDestination(dest_id);
        tracing::debug!(peer = %dest_id, error = %err, "relay payload dropped");
        return None;
    }
    Some(())
}

async fn handle_channeled(ctx: &DispatchContext, source_id: PeerId, dest_id: PeerId, payload: ChanneledPayload) {
    if let ChanneledPayload::FailedConnect = payload {
        ctx.sender.bounce_failed_connect(&ctx.peers, source_id).await;
        return;
    }

    if relay_preflight(ctx, source_id, dest_id).is_none() {
        return;
    }
    let Some(peer) = ctx.peers.get(source_id) else {
        return;
    };
    let connection_id = ctx
        .relays
        .create_or_get(source_id, dest_id, peer.application_id, TransportKind::Channeled);

    if let ChanneledPayload::Data { bytes } = &payload {
        if ctx.relays.record_forward(connection_id, bytes.len()).is_ok() {
            ctx.metrics.packet_relayed(bytes.len());
        }
    }

    ctx.sender.forward_channeled(&ctx.peers, dest_id, source_id, payload).await;
}

async fn handle_sockets(ctx: &DispatchContext, source_id: PeerId, dest_id: PeerId, payload: SocketsPayload) {
    if relay_preflight(ctx, source_id, dest_id).is_none() {
        return;
    }
    let Some(peer) = ctx.peers.get(source_id) else {
        return;
    };

    match &payload {
        SocketsPayload::Request { .. } => {
            ctx.relays
                .create_or_get(source_id, dest_id, peer.application_id, TransportKind::StreamOriented);
        }
        SocketsPayload::Accepted { .. } => {
            if let Some(id) = ctx
                .relays
                .find(source_id, dest_id, TransportKind::StreamOriented)
            {
                let _ = ctx.relays.transition(id, protocol::ConnectionState::Connected);
            }
        }
        SocketsPayload::Data { bytes, .. } => {
            let id = ctx
                .relays
                .create_or_get(source_id, dest_id, peer.application_id, TransportKind::StreamOriented);
            if ctx.relays.record_forward(id, bytes.len()).is_ok() {
                ctx.metrics.packet_relayed(bytes.len());
            }
        }
        SocketsPayload::End { .. } => {
            if let Some(id) = ctx
                .relays
                .find(source_id, dest_id, TransportKind::StreamOriented)
            {
                let _ = ctx.relays.transition(id, protocol::ConnectionState::Disconnecting);
                ctx.relays.close(id);
            }
        }
    }

    ctx.sender.forward_sockets(&ctx.peers, dest_id, source_id, payload).await;
}

async fn handle_messages(ctx: &DispatchContext, source_id: PeerId, dest_id: PeerId, payload: MessagesPayload) {
    if relay_preflight(ctx, source_id, dest_id).is_none() {
        return;
    }
    let Some(peer) = ctx.peers.get(source_id) else {
        return;
    };

    match &payload {
        MessagesPayload::New { .. } => {
            ctx.relays
                .create_or_get(source_id, dest_id, peer.application_id, TransportKind::MessageOriented);
        }
        MessagesPayload::Accept { .. } => {
            if let Some(id) = ctx
                .relays
                .find(source_id, dest_id, TransportKind::MessageOriented)
            {
                let _ = ctx.relays.transition(id, protocol::ConnectionState::Connected);
            }
        }
        MessagesPayload::Data { bytes, .. } => {
            let id = ctx
                .relays
                .create_or_get(source_id, dest_id, peer.application_id, TransportKind::MessageOriented);
            if ctx.relays.record_forward(id, bytes.len()).is_ok() {
                ctx.metrics.packet_relayed(bytes.len());
            }
        }
        MessagesPayload::End { .. } => {
            if let Some(id) = ctx
                .relays
                .find(source_id, dest_id, TransportKind::MessageOriented)
            {
                let _ = ctx.relays.transition(id, protocol::ConnectionState::Disconnecting);
                ctx.relays.close(id);
            }
        }
    }

    ctx.sender.forward_messages(&ctx.peers, dest_id, source_id, payload).await;
}
