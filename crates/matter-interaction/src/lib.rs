//! # matter-interaction
//!
//! The Interaction Model messenger: server-side dispatch for
//! Read/Write/Subscribe/Invoke/Timed requests, the DataReport chunking
//! engine that splits a data source's attribute/event reports across
//! as many `ReportData` messages as the transport's MTU requires, and
//! the client-side aggregator that reassembles chunked responses.
//!
//! What a Read/Write/Invoke actually *does* against a node's clusters
//! is an external collaborator (the data-model/cluster implementation);
//! this crate only owns the request/response and chunking protocol
//! around it.

pub mod chunker;
pub mod client;
pub mod data_source;
pub mod server;

pub use chunker::{Chunker, ReportDataChunk};
pub use client::{DecodedDataReport, InteractionClientMessenger, InteractionMessenger};
pub use data_source::{AttributeDataSource, EventDataSource};
pub use server::InteractionServerHandler;

#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error(transparent)]
    Wire(#[from] matter_wire::WireError),

    #[error(transparent)]
    Exchange(#[from] matter_exchange::ExchangeError),

    /// The per-peer interaction queue rejected this call (closed, or
    /// cancelled while waiting for a slot).
    #[error(transparent)]
    Queue(#[from] matter_queue::QueueError),

    /// A request referenced a subscription id this node doesn't know
    /// about.
    #[error("unknown subscription {0}")]
    UnknownSubscription(u32),

    /// A peer replied to a client-initiated request with a non-success
    /// `StatusResponse`.
    #[error("peer returned status {0:?}")]
    StatusResponse(matter_types::StatusCode),

    /// The exchange a client call was waiting on closed before the
    /// expected reply arrived.
    #[error("exchange closed before a reply arrived: {0:?}")]
    ExchangeClosed(matter_exchange::ExchangeCloseReason),

    /// A reply arrived on a client-owned exchange of a type the call in
    /// progress wasn't expecting.
    #[error("unexpected message type on a client-owned exchange")]
    UnexpectedMessage,
}

pub type Result<T> = std::result::Result<T, InteractionError>;
