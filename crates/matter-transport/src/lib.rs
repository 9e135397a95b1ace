//! # matter-transport
//!
//! Connectionless datagram transport for the Matter core.
//!
//! Matter's transport layer moves opaque, already-framed message bytes
//! between a local and a remote address; reliability, ordering, and
//! session security live above it in `matter-session` and
//! `matter-exchange`. This crate provides:
//!
//! - [`Transport`], an address-agnostic send/receive abstraction via
//!   [`udp`]
//! - a concrete UDP implementation honoring the v1.x 1280-byte MTU
//!   budget
//!
//! ## Architecture
//!
//! ```text
//! Application
//!     |
//!     v
//! matter-interaction / matter-exchange
//!     |
//!     v
//! matter-session        -- secures/unsecures Message bytes
//!     |
//!     v
//! Transport (this crate) -- send_to/recv_from opaque datagrams
//!     |
//!     v
//! UDP socket
//! ```

pub mod udp;

use std::net::SocketAddr;

use async_trait::async_trait;

/// Errors a [`Transport`] implementation can surface.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller tried to send a datagram larger than the transport's
    /// MTU budget.
    #[error("datagram too large: {size} bytes, max {max}")]
    TooLarge { size: usize, max: usize },

    /// The transport was closed and can no longer send or receive.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// An address-agnostic, connectionless datagram transport.
///
/// Implementations carry bytes only; they never parse a Matter message.
/// Matter runs over several link types (IP/UDP, BLE, a future
/// connectionless carrier) that all reduce to "send some bytes to a
/// peer" and "receive some bytes from a peer" at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` to `dest`. Implementations must reject payloads
    /// over their MTU budget with [`TransportError::TooLarge`] rather
    /// than silently fragmenting, since Matter messages are already
    /// sized to fit a single datagram.
    async fn send_to(&self, dest: SocketAddr, payload: &[u8]) -> Result<()>;

    /// Receive the next datagram, along with the address it arrived
    /// from.
    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr)>;

    /// The local address this transport is bound to.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// This transport's maximum payload size in bytes.
    fn mtu(&self) -> usize {
        matter_types::MAX_UDP_PAYLOAD_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_error_reports_both_sizes() {
        let err = TransportError::TooLarge { size: 2000, max: 1280 };
        assert_eq!(err.to_string(), "datagram too large: 2000 bytes, max 1280");
    }
}
