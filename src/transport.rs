//! UDP transport: one socket, one datagram per message.
//!
//! No buffering, retrying, or reassembly happens here (§4.1). `recv` and
//! `send` are the entire surface; everything above this layer treats a
//! `SocketAddr` as the durable identity of "where a peer currently is."

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::error::CoreError;

/// Datagrams larger than this are never produced by this core and are
/// rejected on decode rather than grown into; matches typical UDP MTU
/// headroom for the wire schema's largest payload (a full peer list).
pub const MAX_DATAGRAM_SIZE: usize = 65_527;

/// Thin wrapper around a bound UDP socket. Cheap to clone (an `Arc`
/// underneath), so every subsystem that needs to emit a datagram can hold
/// its own handle without contending on a single owner.
#[derive(Clone)]
pub struct Transport {
    socket: Arc<UdpSocket>,
}

impl Transport {
    /// Bind to `addr`. A bind failure is fatal (§7): the caller should log
    /// at `critical` and terminate the process, there is no partial-server
    /// mode.
    pub async fn bind(addr: SocketAddr) -> Result<Self, CoreError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|err| CoreError::Fatal(format!("failed to bind UDP socket on {addr}: {err}")))?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Receive the next datagram. A benign terminal error (socket closed
    /// during shutdown) surfaces as `Ok(None)` so the receive loop can exit
    /// cleanly instead of logging it as a failure.
    pub async fn recv(&self) -> Result<Option<(Vec<u8>, SocketAddr)>, CoreError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        match self.socket.recv_from(&mut buf).await {
            Ok((len, source)) => {
                buf.truncate(len);
                Ok(Some((buf, source)))
            }
            Err(err) if is_benign_shutdown(&err) => Ok(None),
            Err(err) => Err(CoreError::Fatal(format!("UDP receive failed: {err}"))),
        }
    }

    /// Send one datagram. Safe to call concurrently from any worker; the
    /// underlying socket handle may be shared freely.
    pub async fn send(&self, bytes: &[u8], destination: SocketAddr) -> Result<(), CoreError> {
        self.socket
            .send_to(bytes, destination)
            .await
            .map(|_| ())
            .map_err(|source| CoreError::Send {
                addr: destination,
                source,
            })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoreError> {
        self.socket
            .local_addr()
            .map_err(|err| CoreError::Fatal(format!("failed to read local address: {err}")))
    }
}

fn is_benign_shutdown(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::NotConnected | std::io::ErrorKind::BrokenPipe
    )
}
