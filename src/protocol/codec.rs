//! Decode/encode the envelope to and from its MessagePack wire
//! representation. The exact wire schema is an external collaborator
//! (§1), so the only contract this module owes the rest of the core is
//! the round-trip guarantee: `decode(encode(m)) == m` for every payload
//! variant the core itself produces.

use super::messages::CommonMessage;

/// Decode one datagram's worth of bytes into an envelope.
///
/// Malformed or truncated input, and any variant that fails to
/// deserialize, is a non-fatal decode failure: the caller logs and drops.
pub fn decode(bytes: &[u8]) -> Result<CommonMessage, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

/// Encode an envelope to its wire form.
///
/// Encoding a value this core constructed internally cannot fail in
/// practice (no non-serializable types appear in [`CommonMessage`]), but
/// `rmp_serde` returns `Result` so callers still see it explicitly.
pub fn encode(message: &CommonMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{AnnouncePayload, AnnouncedPeer, MessagePayload};
    use crate::protocol::types::{ApplicationId, PeerId};
    use proptest::prelude::*;

    #[test]
    fn round_trips_announce_pong() {
        let msg = CommonMessage::new(
            PeerId(0),
            PeerId(1001),
            MessagePayload::Announce(AnnouncePayload::Pong {
                peers: vec![AnnouncedPeer {
                    peer_id: PeerId(1002),
                    ip: 0x0A00_0006,
                    udp_port: 40000,
                    application_id: ApplicationId(730),
                }],
            }),
        );

        let bytes = encode(&msg).expect("encode");
        let decoded = decode(&bytes).expect("decode");

        assert_eq!(decoded.source_id, msg.source_id);
        assert_eq!(decoded.dest_id, msg.dest_id);
        match decoded.payload {
            MessagePayload::Announce(AnnouncePayload::Pong { peers }) => {
                assert_eq!(peers.len(), 1);
                assert_eq!(peers[0].peer_id, PeerId(1002));
                assert_eq!(peers[0].ip, 0x0A00_0006);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn decode_of_garbage_is_a_non_fatal_error() {
        let garbage = [0xFFu8; 8];
        assert!(decode(&garbage).is_err());
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_arbitrary_ping(source in any::<u64>(), dest in any::<u64>(), app in any::<u32>(), tcp_port in any::<u16>()) {
            let msg = CommonMessage::new(
                PeerId(source),
                PeerId(dest),
                MessagePayload::Announce(AnnouncePayload::Ping {
                    application_id: ApplicationId(app),
                    tcp_port,
                }),
            );
            let bytes = encode(&msg).unwrap();
            let decoded = decode(&bytes).unwrap();
            prop_assert_eq!(decoded.source_id, msg.source_id);
            prop_assert_eq!(decoded.dest_id, msg.dest_id);
        }

        #[test]
        fn ip_packing_round_trips_for_arbitrary_octets(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            use crate::protocol::types::{ip_from_be_u32, ip_to_be_u32};
            use std::net::Ipv4Addr;

            let ip = Ipv4Addr::new(a, b, c, d);
            let packed = ip_to_be_u32(ip);
            prop_assert_eq!(
                packed,
                (u32::from(a) << 24) | (u32::from(b) << 16) | (u32::from(c) << 8) | u32::from(d)
            );
            prop_assert_eq!(ip_from_be_u32(packed), ip);
        }
    }
}
