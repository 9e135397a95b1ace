//! # matter-wire
//!
//! The Matter message format: nested packet/payload headers plus an
//! opaque application payload, and the small TLV-shaped structures the
//! Interaction Model needs to describe attribute/event paths and
//! reports.
//!
//! Framing follows the same discipline as a typed protocol envelope —
//! fixed fields up front, then an opaque payload the next layer up
//! interprets — generalized here to Matter's two-header wire format
//! instead of a single version/type/id envelope.

pub mod datamodel;
pub mod message;
pub mod tlv;

pub use message::{Message, PacketHeader, PayloadHeader, PayloadHeaderFlags};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The buffer ended before a fixed-size field could be read.
    #[error("truncated message: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    /// A length-prefixed field's stated length didn't fit the remaining
    /// buffer.
    #[error("malformed length-prefixed field")]
    MalformedLength,
    /// A TLV tag/type byte was not one this codec understands.
    #[error("unsupported TLV control byte: {0:#x}")]
    UnsupportedTlvControl(u8),
    /// The encoded message would exceed the channel's maximum payload
    /// size.
    #[error("encoded message too large: {size} bytes, max {max}")]
    TooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
