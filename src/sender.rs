//! Typed fan-out helpers: pong, direct lobby-messages,
//! lobby-update broadcasts, and typed relay forwards. Every helper here
//! resolves a `PeerId` to its current UDP endpoint via the peer registry,
//! encodes one envelope per recipient, and sends; failures on individual
//! recipients are logged and never abort the rest of a fan-out.

use crate::protocol::{
    codec, AnnouncedPeer, ChanneledPayload, CommonMessage, LobbyMessagePayload, LobbyPayload,
    LobbyRecord, MessagePayload, MessagesPayload, PeerId, SocketsPayload,
};
use crate::registry::PeerRegistry;
use crate::transport::Transport;

/// Emits the four message families the core produces. Holds the
/// master-server identity used as the default `source_id` for
/// server-originated sends (pong, lobby-query results); relays preserve
/// the original sender's id instead.
#[derive(Clone)]
pub struct Sender {
    transport: Transport,
    master_server_id: PeerId,
}

impl Sender {
    pub fn new(transport: Transport, master_server_id: u64) -> Self {
        Self {
            transport,
            master_server_id: PeerId(master_server_id),
        }
    }

    /// Low-level single-recipient emit. Resolves `dest` through `registry`;
    /// an unresolvable peer or a transport failure is logged and swallowed.
    async fn emit(&self, registry: &PeerRegistry, source: PeerId, dest: PeerId, payload: MessagePayload) {
        let Some(peer) = registry.get(dest) else {
            tracing::debug!(peer = %dest, "dropping send to unresolvable peer");
            return;
        };

        let message = CommonMessage::new(source, dest, payload);
        let bytes = match codec::encode(&message) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(peer = %dest, error = %err, "failed to encode outbound message");
                return;
            }
        };

        if let Err(err) = self.transport.send(&bytes, peer.endpoint).await {
            tracing::error!(peer = %dest, error = %err, "failed to send outbound datagram");
        }
    }

    /// Unicast an announce-pong to `dest`, carrying the current peer list
    /// for its application.
    pub async fn send_pong(&self, registry: &PeerRegistry, dest: PeerId, peers: Vec<AnnouncedPeer>) {
        self.emit(
            registry,
            self.master_server_id,
            dest,
            MessagePayload::Announce(crate::protocol::AnnouncePayload::Pong { peers }),
        )
        .await;
    }

    /// Unicast one lobby-query result envelope.
    pub async fn send_lobby_query_result(&self, registry: &PeerRegistry, dest: PeerId, record: LobbyRecord) {
        self.emit(
            registry,
            self.master_server_id,
            dest,
            MessagePayload::Lobby(LobbyPayload::QueryResult(record)),
        )
        .await;
    }

    /// Broadcast the new/updated lobby record to every recipient
    /// (create/update does not exclude the owner — the owner is a member
    /// like any other and receives its own update).
    pub async fn broadcast_lobby_record(&self, registry: &PeerRegistry, recipients: &[PeerId], record: LobbyRecord) {
        for &dest in recipients {
            self.emit(
                registry,
                self.master_server_id,
                dest,
                MessagePayload::Lobby(LobbyPayload::Upsert(record.clone())),
            )
            .await;
        }
    }

    /// Unicast the full lobby state to a joining peer, reusing the same
    /// upsert framing a create/update broadcast would carry.
    pub async fn unicast_lobby_state(&self, registry: &PeerRegistry, dest: PeerId, source: PeerId, record: LobbyRecord) {
        self.emit(registry, source, dest, MessagePayload::Lobby(LobbyPayload::Upsert(record)))
            .await;
    }

    /// Broadcast a lobby-messages payload (join/leave/change-owner/
    /// member-data/chat) to every recipient, preserving the original
    /// sender's id as `source_id`.
    pub async fn broadcast_lobby_message(
        &self,
        registry: &PeerRegistry,
        recipients: &[PeerId],
        source: PeerId,
        payload: LobbyMessagePayload,
    ) {
        for &dest in recipients {
            self.emit(
                registry,
                source,
                dest,
                MessagePayload::LobbyMessages(payload.clone()),
            )
            .await;
        }
    }

    /// Forward a network-channeled payload, preserving the original
    /// sender's id.
    pub async fn forward_channeled(&self, registry: &PeerRegistry, dest: PeerId, source: PeerId, payload: ChanneledPayload) {
        self.emit(registry, source, dest, MessagePayload::NetworkChanneled(payload))
            .await;
    }

    /// Forward a networking-sockets (stream-oriented) payload.
    pub async fn forward_sockets(&self, registry: &PeerRegistry, dest: PeerId, source: PeerId, payload: SocketsPayload) {
        self.emit(registry, source, dest, MessagePayload::NetworkingSockets(payload))
            .await;
    }

    /// Forward a networking-messages (message-oriented) payload.
    pub async fn forward_messages(&self, registry: &PeerRegistry, dest: PeerId, source: PeerId, payload: MessagesPayload) {
        self.emit(registry, source, dest, MessagePayload::NetworkingMessages(payload))
            .await;
    }

    /// Bounce a channeled failed-connect back to the source peer.
    pub async fn bounce_failed_connect(&self, registry: &PeerRegistry, source: PeerId) {
        self.emit(
            registry,
            self.master_server_id,
            source,
            MessagePayload::NetworkChanneled(ChanneledPayload::FailedConnect),
        )
        .await;
    }
}
