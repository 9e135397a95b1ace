//! A single established secure session.

use matter_crypto::kdf::SessionKeys;
use matter_types::{FabricIndex, NodeId, Role, SessionId};

use crate::counter::{MessageCounter, ReceptionState};
use crate::{Result, SessionError};

/// Whether a session secures unicast traffic with one peer or group
/// traffic with a set of peers sharing a group key.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SessionType {
    Unicast,
    Group,
    /// PASE-bootstrap traffic: no encryption, keyed by the session id
    /// 0 on the wire. Kept tracked per-initiator by
    /// [`crate::manager::SessionManager::unsecured_session`] so replay
    /// detection applies to it the same way it does to secure sessions.
    Unsecured,
}

/// Negotiated session timing parameters (advertised during
/// establishment; consumed by the exchange layer's retransmission
/// backoff).
#[derive(Copy, Clone, Debug)]
pub struct SessionParameters {
    /// How long a peer with an active subscription may idle before the
    /// core assumes it's gone, in milliseconds.
    pub session_idle_interval_ms: u32,
    /// How long a peer expected to respond promptly gets before being
    /// considered slow, in milliseconds.
    pub session_active_interval_ms: u32,
    /// How long after a message is sent a peer is still considered
    /// "active" for retransmission timing, in milliseconds.
    pub session_active_threshold_ms: u16,
}

impl Default for SessionParameters {
    fn default() -> Self {
        Self {
            session_idle_interval_ms: 500,
            session_active_interval_ms: 300,
            session_active_threshold_ms: 4000,
        }
    }
}

/// One secure session's local state.
pub struct Session {
    pub local_session_id: SessionId,
    pub peer_session_id: SessionId,
    pub session_type: SessionType,
    pub local_fabric_index: FabricIndex,
    pub peer_node_id: NodeId,
    pub local_role: Role,
    pub parameters: SessionParameters,
    keys: SessionKeys,
    outgoing_counter: MessageCounter,
    reception_state: ReceptionState,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_session_id: SessionId,
        peer_session_id: SessionId,
        session_type: SessionType,
        local_fabric_index: FabricIndex,
        peer_node_id: NodeId,
        local_role: Role,
        keys: SessionKeys,
        starting_counter: u32,
    ) -> Self {
        Self {
            local_session_id,
            peer_session_id,
            session_type,
            local_fabric_index,
            peer_node_id,
            local_role,
            parameters: SessionParameters::default(),
            keys,
            outgoing_counter: MessageCounter::starting_at(starting_counter),
            reception_state: ReceptionState::new(),
        }
    }

    pub fn encrypt_key(&self) -> &[u8] {
        &self.keys.encrypt_key
    }

    pub fn decrypt_key(&self) -> &[u8] {
        &self.keys.decrypt_key
    }

    /// Reserve and return the next outgoing message counter.
    pub fn next_outgoing_counter(&mut self) -> u32 {
        self.outgoing_counter.next()
    }

    /// Check and record an incoming message counter. Returns an error
    /// if it's a duplicate or out of window instead of a bare bool, so
    /// callers can `?` straight through and log a consistent message.
    pub fn accept_incoming_counter(&mut self, counter: u32) -> Result<()> {
        if self.reception_state.accept(counter) {
            Ok(())
        } else {
            Err(SessionError::CounterRejected(counter))
        }
    }
}
