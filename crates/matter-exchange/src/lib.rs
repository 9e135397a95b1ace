//! # matter-exchange
//!
//! The Exchange Manager: allocates and tracks exchanges over secure (or
//! unsecured, bootstrap-only) sessions, dispatches incoming messages to
//! protocol handlers, and drives the Message Reliability Protocol (MRP)
//! retransmission/acknowledgement state machine.
//!
//! An exchange is a request/response (or subscribe/report) conversation
//! scoped to one session; a protocol handler (Secure Channel, the
//! Interaction Model, or any other registered protocol) owns the
//! meaning of the messages exchanged over it. This crate only owns the
//! conversation bookkeeping — allocation, the concurrent-exchange
//! limit, and reliable delivery — not what the messages mean.

pub mod exchange;
pub mod handler;
pub mod manager;
pub mod mrp;

pub use exchange::{Exchange, ExchangeState};
pub use handler::{ExchangeCloseReason, ProtocolHandler};
pub use manager::ExchangeManager;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// A reliably-sent message exhausted its retransmission budget
    /// without being acknowledged.
    #[error("retransmission limit reached for exchange {0:?}")]
    RetransmissionLimitReached(matter_types::ExchangeId),

    /// No response arrived before the caller's timeout.
    #[error("no response received for exchange {0:?}")]
    NoResponseTimeout(matter_types::ExchangeId),

    /// The session this exchange was opened on no longer exists.
    #[error("channel not connected: session closed under exchange {0:?}")]
    ChannelNotConnected(matter_types::ExchangeId),

    /// The session already has the maximum number of concurrent
    /// exchanges open.
    #[error("too many concurrent exchanges on session {0:?}")]
    TooManyExchanges(matter_types::SessionId),

    /// No handler is registered for the incoming message's protocol id.
    #[error("no handler registered for protocol {0:?}")]
    UnhandledProtocol(matter_types::ProtocolId),

    /// A group-addressed packet arrived without the source node id
    /// needed to resolve its per-sender replay state.
    #[error("group-addressed packet missing its source node id")]
    MissingSourceNodeId,

    #[error(transparent)]
    Session(#[from] matter_session::SessionError),

    #[error(transparent)]
    Wire(#[from] matter_wire::WireError),

    #[error(transparent)]
    Transport(#[from] matter_transport::TransportError),

    #[error(transparent)]
    Crypto(#[from] matter_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
