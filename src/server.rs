//! `MasterServer`: owns every subsystem and wires the receive loop,
//! dispatcher, and reaper together.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::{self, DispatchContext};
use crate::error::CoreError;
use crate::lobby::LobbyManager;
use crate::metrics::ServerMetrics;
use crate::protocol::codec;
use crate::reaper;
use crate::registry::{GameserverRegistry, PeerRegistry};
use crate::relay::RelayManager;
use crate::sender::Sender;
use crate::transport::Transport;

pub struct MasterServer {
    config: Arc<Config>,
    transport: Transport,
    ctx: Arc<DispatchContext>,
}

impl MasterServer {
    /// Bind the UDP socket and construct every subsystem. A bind failure
    /// is fatal — there is no partial-server mode.
    pub async fn bind(config: Config) -> Result<Self, CoreError> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
        let transport = Transport::bind(addr).await?;
        let sender = Sender::new(transport.clone(), config.master_server_id);

        let ctx = Arc::new(DispatchContext {
            peers: PeerRegistry::new(),
            lobbies: LobbyManager::new(),
            gameservers: GameserverRegistry::new(),
            relays: RelayManager::new(),
            sender,
            metrics: ServerMetrics::new(),
        });

        Ok(Self {
            config: Arc::new(config),
            transport,
            ctx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoreError> {
        self.transport.local_addr()
    }

    pub fn metrics(&self) -> &ServerMetrics {
        &self.ctx.metrics
    }

    /// Run the receive loop and reaper until a shutdown signal arrives.
    /// Every in-flight dispatch task is spawned independently and is
    /// allowed to run to completion; because the receive loop stops
    /// accepting new datagrams before the process exits, no new mutation
    /// can reach a registry after shutdown begins.
    pub async fn run(self) -> Result<(), CoreError> {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let reaper_handle = tokio::spawn(reaper::run(
            self.ctx.clone(),
            self.config.peer_cleanup_interval(),
            self.config.peer_timeout(),
            self.config.lobby_retention(),
            self.config.relay_connection_timeout(),
            shutdown_rx,
        ));

        loop {
            tokio::select! {
                received = self.transport.recv() => {
                    match received {
                        Ok(Some((bytes, addr))) => {
                            let ctx = self.ctx.clone();
                            tokio::spawn(async move {
                                match codec::decode(&bytes) {
                                    Ok(message) => dispatch::dispatch(&ctx, message, addr).await,
                                    Err(err) => {
                                        let err = CoreError::Decode(err.to_string());
                                        tracing::warn!(%addr, error = %err, "failed to decode datagram; dropped");
                                    }
                                }
                            });
                        }
                        Ok(None) => {
                            tracing::info!("transport closed; receive loop exiting");
                            break;
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "fatal receive error; terminating");
                            let _ = shutdown_tx.send(true);
                            let _ = reaper_handle.await;
                            return Err(err);
                        }
                    }
                }
                _ = shutdown_signal() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        let _ = reaper_handle.await;
        Ok(())
    }
}

/// Resolves on `ctrl_c` (SIGINT) or, on Unix, SIGTERM — whichever fires
/// first.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
                unreachable!()
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_picks_an_ephemeral_port_and_reports_it() {
        let mut config = Config::default();
        config.port = 0;
        let server = MasterServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
