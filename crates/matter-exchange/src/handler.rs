//! The interface a protocol (Secure Channel, the Interaction Model,
//! ...) implements to receive dispatched messages from the exchange
//! manager.

use async_trait::async_trait;
use matter_types::{ExchangeId, MessageType, ProtocolId, SessionId};

use crate::manager::ExchangeManager;

/// Why an exchange was torn down, passed to a handler's
/// [`ProtocolHandler::on_exchange_closed`] so it can clean up any
/// conversation state it was keeping (e.g. a partially-assembled
/// subscription).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ExchangeCloseReason {
    /// The conversation completed normally.
    Completed,
    /// MRP exhausted its retransmission budget without an ack.
    RetransmissionLimitReached,
    /// The underlying session was torn down.
    SessionClosed,
    /// The exchange manager itself is shutting down.
    ManagerShutdown,
}

/// A handler registered for one [`ProtocolId`].
///
/// The exchange manager owns delivery guarantees (acknowledgement,
/// retransmission, ordering within one exchange); the handler owns
/// what the messages mean and any reply it wants to send back through
/// the same `manager`/`exchange_id`.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    fn protocol_id(&self) -> ProtocolId;

    /// Handle one incoming application payload on `exchange_id`.
    /// Handlers that want to reply call back into `manager` using the
    /// same `exchange_id`.
    async fn on_message(
        &self,
        manager: &ExchangeManager,
        session_id: SessionId,
        exchange_id: ExchangeId,
        message_type: MessageType,
        payload: Vec<u8>,
    );

    /// Notify the handler that an exchange it was participating in has
    /// closed. Default no-op: most handlers only care while the
    /// exchange is open.
    async fn on_exchange_closed(&self, _session_id: SessionId, _exchange_id: ExchangeId, _reason: ExchangeCloseReason) {}
}
