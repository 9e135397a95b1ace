//! The node binary's top-level error type, composing every crate
//! boundary's error via `#[from]` the way `ochra-transport`'s error
//! enums compose into `ochra-daemon`'s handlers.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] matter_transport::TransportError),

    #[error(transparent)]
    Session(#[from] matter_session::SessionError),

    #[error(transparent)]
    Exchange(#[from] matter_exchange::ExchangeError),

    #[error(transparent)]
    Interaction(#[from] matter_interaction::InteractionError),

    #[error(transparent)]
    Wire(#[from] matter_wire::WireError),

    #[error(transparent)]
    Crypto(#[from] matter_crypto::CryptoError),

    #[error(transparent)]
    Queue(#[from] matter_queue::QueueError),

    #[error(transparent)]
    Persistence(#[from] matter_types::persistence::PersistenceError),

    #[error("configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
