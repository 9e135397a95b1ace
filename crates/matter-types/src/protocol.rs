//! Protocol and message type registry.
//!
//! The core only needs to recognize message types belonging to the
//! Secure Channel and Interaction Model protocols; any other
//! `protocol_id` is routed to an externally registered
//! `ProtocolHandler` by the Exchange Manager.

use serde::{Deserialize, Serialize};

/// Well-known protocol identifiers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct ProtocolId(pub u32);

impl ProtocolId {
    /// Secure Channel protocol (0x0000): PASE/CASE establishment, status
    /// reports, and the standalone-ack message type used by MRP.
    pub const SECURE_CHANNEL: ProtocolId = ProtocolId(0x0000);
    /// Interaction Model protocol (0x0001): Read/Write/Subscribe/Invoke.
    pub const INTERACTION_MODEL: ProtocolId = ProtocolId(0x0001);
}

/// Message type codes. Scoped to a `ProtocolId`; the same numeric value
/// means different things under different protocols, so callers must
/// always pair a `MessageType` with the `ProtocolId` it was read under.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct MessageType(pub u8);

impl MessageType {
    // Secure Channel
    /// Standalone acknowledgement (zero-payload MRP ack).
    pub const STANDALONE_ACK: MessageType = MessageType(0x10);

    // Interaction Model
    /// `StatusResponse`.
    pub const STATUS_RESPONSE: MessageType = MessageType(0x01);
    /// `ReadRequest`.
    pub const READ_REQUEST: MessageType = MessageType(0x02);
    /// `SubscribeRequest`.
    pub const SUBSCRIBE_REQUEST: MessageType = MessageType(0x03);
    /// `SubscribeResponse`.
    pub const SUBSCRIBE_RESPONSE: MessageType = MessageType(0x04);
    /// `ReportData` (a DataReport chunk).
    pub const REPORT_DATA: MessageType = MessageType(0x05);
    /// `WriteRequest`.
    pub const WRITE_REQUEST: MessageType = MessageType(0x06);
    /// `WriteResponse`.
    pub const WRITE_RESPONSE: MessageType = MessageType(0x07);
    /// `InvokeRequest`.
    pub const INVOKE_REQUEST: MessageType = MessageType(0x08);
    /// `InvokeResponse`.
    pub const INVOKE_RESPONSE: MessageType = MessageType(0x09);
    /// `TimedRequest`.
    pub const TIMED_REQUEST: MessageType = MessageType(0x0a);
}
