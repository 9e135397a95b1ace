//! UDP transport for the Matter core.
//!
//! ## Lifecycle
//!
//! 1. The node binds one UDP socket per configured network interface.
//! 2. [`UdpTransport::send_to`] writes a single datagram per call; the
//!    session/exchange layers above are responsible for keeping each
//!    message within [`UdpTransport::mtu`].
//! 3. [`UdpTransport::recv_from`] reads the next datagram. Matter has
//!    no connection handshake at this layer — any source address is
//!    accepted and handed to the exchange manager to route.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::{Result, Transport, TransportError};

/// Configuration for a [`UdpTransport`].
#[derive(Clone, Debug)]
pub struct UdpConfig {
    /// Local address to bind to. Port 0 lets the OS pick an ephemeral
    /// port, which the loopback demo and tests rely on.
    pub bind_addr: SocketAddr,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }
}

/// A UDP-backed [`Transport`].
///
/// Wraps a single [`tokio::net::UdpSocket`]; cheap to clone via `Arc`
/// since sends and receives only need a shared reference.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind a new UDP transport at `config.bind_addr`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket cannot be bound.
    pub async fn bind(config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        let local_addr = socket.local_addr()?;
        tracing::debug!(%local_addr, "udp transport bound");
        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, dest: SocketAddr, payload: &[u8]) -> Result<()> {
        if payload.len() > self.mtu() {
            return Err(TransportError::TooLarge {
                size: payload.len(),
                max: self.mtu(),
            });
        }
        self.socket.send_to(payload, dest).await?;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; self.mtu()];
        let (len, src) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, src))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_roundtrip() {
        let a = UdpTransport::bind(UdpConfig::default()).await.expect("bind a");
        let b = UdpTransport::bind(UdpConfig::default()).await.expect("bind b");

        let b_addr = b.local_addr().expect("b addr");
        a.send_to(b_addr, b"hello matter").await.expect("send");

        let (payload, from) = b.recv_from().await.expect("recv");
        assert_eq!(payload, b"hello matter");
        assert_eq!(from, a.local_addr().expect("a addr"));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected() {
        let a = UdpTransport::bind(UdpConfig::default()).await.expect("bind a");
        let big = vec![0u8; a.mtu() + 1];
        let err = a.send_to(a.local_addr().expect("addr"), &big).await.unwrap_err();
        assert!(matches!(err, TransportError::TooLarge { .. }));
    }
}
