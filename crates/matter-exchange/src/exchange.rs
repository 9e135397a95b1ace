//! A single exchange: one request/response (or subscribe/report)
//! conversation scoped to a session.

use matter_types::{ExchangeId, ProtocolId, Role, SessionId};

use crate::handler::ExchangeCloseReason;

/// Where an exchange sits in its lifecycle.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ExchangeState {
    /// Accepting further messages in either direction.
    Open,
    /// The local side has decided the conversation is over but still
    /// owes the peer an acknowledgement; the table entry stays live
    /// until that ack actually goes out (see [`Exchange::ack_sent`]).
    ClosingAwaitingAck,
    /// Fully closed; the manager drops the table entry in the same
    /// step that reaches this state.
    Closed,
}

/// One exchange's local bookkeeping.
pub struct Exchange {
    pub exchange_id: ExchangeId,
    pub session_id: SessionId,
    pub protocol_id: ProtocolId,
    pub role: Role,
    pub state: ExchangeState,
    /// A peer message counter this exchange still owes an
    /// acknowledgement for, set when a `requires_ack` message arrives
    /// and cleared once any reply (or a standalone ack) goes out.
    pub pending_ack: Option<u32>,
    pub created_at: std::time::Instant,
    deferred_close: Option<ExchangeCloseReason>,
}

impl Exchange {
    pub fn new(exchange_id: ExchangeId, session_id: SessionId, protocol_id: ProtocolId, role: Role) -> Self {
        Self {
            exchange_id,
            session_id,
            protocol_id,
            role,
            state: ExchangeState::Open,
            pending_ack: None,
            created_at: std::time::Instant::now(),
            deferred_close: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ExchangeState::Closed)
    }

    pub fn owes_ack(&self) -> Option<u32> {
        self.pending_ack
    }

    pub fn set_pending_ack(&mut self, counter: u32) {
        self.pending_ack = Some(counter);
    }

    pub fn clear_pending_ack(&mut self) {
        self.pending_ack = None;
    }

    /// Begin tearing down this exchange for `reason`. If it still owes
    /// the peer an acknowledgement, moves to `ClosingAwaitingAck` and
    /// returns `false` — the caller must keep the table entry live
    /// until [`Exchange::ack_sent`] reports that ack has gone out.
    /// Otherwise moves straight to `Closed` and returns `true`,
    /// meaning the caller can drop the table entry now.
    pub fn begin_close(&mut self, reason: ExchangeCloseReason) -> bool {
        if self.pending_ack.is_some() {
            self.state = ExchangeState::ClosingAwaitingAck;
            self.deferred_close = Some(reason);
            false
        } else {
            self.state = ExchangeState::Closed;
            true
        }
    }

    /// Tear down immediately regardless of any acknowledgement still
    /// owed, for cases where waiting for it no longer makes sense (the
    /// peer is unreachable, or the manager itself is shutting down).
    pub fn force_close(&mut self) {
        self.state = ExchangeState::Closed;
        self.pending_ack = None;
        self.deferred_close = None;
    }

    /// Record that a message carrying the previously-owed acknowledgement
    /// has actually gone out over the wire. Returns the close reason
    /// `begin_close` deferred, if this exchange was waiting on it —
    /// the caller should finalize the close now.
    pub fn ack_sent(&mut self) -> Option<ExchangeCloseReason> {
        self.pending_ack = None;
        if self.state == ExchangeState::ClosingAwaitingAck {
            self.state = ExchangeState::Closed;
            self.deferred_close.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_exchange_is_open_with_no_pending_ack() {
        let exchange = Exchange::new(ExchangeId(1), SessionId(1), ProtocolId::INTERACTION_MODEL, Role::Initiator);
        assert_eq!(exchange.state, ExchangeState::Open);
        assert_eq!(exchange.owes_ack(), None);
        assert!(!exchange.is_closed());
    }

    #[test]
    fn pending_ack_set_and_cleared() {
        let mut exchange = Exchange::new(ExchangeId(1), SessionId(1), ProtocolId::INTERACTION_MODEL, Role::Responder);
        exchange.set_pending_ack(7);
        assert_eq!(exchange.owes_ack(), Some(7));
        exchange.clear_pending_ack();
        assert_eq!(exchange.owes_ack(), None);
    }

    #[test]
    fn begin_close_finalizes_immediately_with_no_ack_owed() {
        let mut exchange = Exchange::new(ExchangeId(1), SessionId(1), ProtocolId::INTERACTION_MODEL, Role::Initiator);
        assert!(exchange.begin_close(ExchangeCloseReason::Completed));
        assert_eq!(exchange.state, ExchangeState::Closed);
        assert!(exchange.is_closed());
    }

    #[test]
    fn begin_close_defers_while_an_ack_is_owed() {
        let mut exchange = Exchange::new(ExchangeId(1), SessionId(1), ProtocolId::INTERACTION_MODEL, Role::Responder);
        exchange.set_pending_ack(5);
        assert!(!exchange.begin_close(ExchangeCloseReason::Completed));
        assert_eq!(exchange.state, ExchangeState::ClosingAwaitingAck);
        assert!(!exchange.is_closed());

        let reason = exchange.ack_sent();
        assert_eq!(reason, Some(ExchangeCloseReason::Completed));
        assert_eq!(exchange.state, ExchangeState::Closed);
        assert!(exchange.is_closed());
    }

    #[test]
    fn ack_sent_without_a_deferred_close_reports_nothing() {
        let mut exchange = Exchange::new(ExchangeId(1), SessionId(1), ProtocolId::INTERACTION_MODEL, Role::Responder);
        exchange.set_pending_ack(5);
        assert_eq!(exchange.ack_sent(), None);
        assert_eq!(exchange.state, ExchangeState::Open);
        assert_eq!(exchange.owes_ack(), None);
    }

    #[test]
    fn force_close_overrides_a_pending_ack() {
        let mut exchange = Exchange::new(ExchangeId(1), SessionId(1), ProtocolId::INTERACTION_MODEL, Role::Responder);
        exchange.set_pending_ack(5);
        exchange.force_close();
        assert!(exchange.is_closed());
        assert_eq!(exchange.owes_ack(), None);
    }
}
