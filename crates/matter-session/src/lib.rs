//! # matter-session
//!
//! Secure session state for the Matter core: per-session symmetric
//! keys, outgoing message counters, replay-window tracking for
//! incoming counters, and the session table itself.
//!
//! A session pairs two nodes (or, for group sessions, a sender with a
//! group's membership) over an established secure channel. Establishing
//! that channel — PASE/CASE — is an external collaborator; this crate
//! only manages sessions once they exist and enforces the wire-level
//! rules (counter monotonicity, replay-window acceptance, session
//! lifetime) that don't depend on how the keys were derived.

pub mod counter;
pub mod group;
pub mod manager;
pub mod session;

pub use counter::ReceptionState;
pub use manager::{SessionEvent, SessionManager};
pub use session::{Session, SessionParameters, SessionType};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given session id.
    #[error("unknown session id {0:?}")]
    UnknownSession(matter_types::SessionId),

    /// The incoming message counter was outside the acceptance window
    /// (already seen, or the session's duplicate).
    #[error("message counter {0} rejected by replay window")]
    CounterRejected(u32),

    /// The local outgoing counter reached its 32-bit bound; rolling a
    /// session is the documented recovery and is left to the caller.
    #[error("outgoing message counter exhausted")]
    CounterExhausted,

    /// A group-addressed packet didn't decrypt under any key installed
    /// for that group.
    #[error("no installed key for group {0:?} decrypts this packet")]
    GroupKeyNotFound(matter_types::GroupId),

    #[error(transparent)]
    Crypto(#[from] matter_crypto::CryptoError),

    #[error(transparent)]
    Wire(#[from] matter_wire::WireError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
