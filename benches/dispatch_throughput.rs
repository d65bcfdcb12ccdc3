use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use criterion::{criterion_group, criterion_main, Criterion};
use masterlink_server::dispatch::{self, DispatchContext};
use masterlink_server::lobby::LobbyManager;
use masterlink_server::metrics::ServerMetrics;
use masterlink_server::protocol::{codec, AnnouncePayload, ApplicationId, CommonMessage, MessagePayload, PeerId};
use masterlink_server::registry::{GameserverRegistry, PeerRegistry};
use masterlink_server::relay::RelayManager;
use masterlink_server::sender::Sender;
use masterlink_server::transport::Transport;

fn build_context(rt: &tokio::runtime::Runtime) -> DispatchContext {
    rt.block_on(async {
        let transport = Transport::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .unwrap();
        DispatchContext {
            peers: PeerRegistry::new(),
            lobbies: LobbyManager::new(),
            gameservers: GameserverRegistry::new(),
            relays: RelayManager::new(),
            sender: Sender::new(transport, 0x0010_0001_DEAD_BEEF),
            metrics: ServerMetrics::new(),
        }
    })
}

fn bench_dispatch_announce_ping(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = build_context(&rt);
    let source_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 40000);

    c.bench_function("dispatch_announce_ping", |b| {
        b.iter(|| {
            rt.block_on(async {
                let message = CommonMessage::new(
                    PeerId(1001),
                    PeerId(0),
                    MessagePayload::Announce(AnnouncePayload::Ping {
                        application_id: ApplicationId(730),
                        tcp_port: 27015,
                    }),
                );
                dispatch::dispatch(black_box(&ctx), message, source_addr).await;
            });
        });
    });
}

fn bench_codec_round_trip(c: &mut Criterion) {
    let message = CommonMessage::new(
        PeerId(1001),
        PeerId(0),
        MessagePayload::Announce(AnnouncePayload::Ping {
            application_id: ApplicationId(730),
            tcp_port: 27015,
        }),
    );

    c.bench_function("codec_encode_decode_announce_ping", |b| {
        b.iter(|| {
            let bytes = codec::encode(black_box(&message)).unwrap();
            black_box(codec::decode(&bytes).unwrap());
        });
    });
}

criterion_group!(dispatch_throughput, bench_dispatch_announce_ping, bench_codec_round_trip);
criterion_main!(dispatch_throughput);
