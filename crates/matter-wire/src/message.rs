//! Packet header, payload header, and the full message envelope.
//!
//! For an unsecured (PASE bootstrap) session the whole message is sent
//! in the clear via [`Message::encode_unsecured`]/[`decode_unsecured`].
//! For a secure session the session layer calls
//! [`Message::split_for_secure`] to get the packet header (used as AEAD
//! associated data) and the plaintext to encrypt, then reassembles the
//! decrypted message on the receive side with
//! [`Message::from_secure_parts`].

use matter_types::{ExchangeId, GroupId, NodeId, ProtocolId, SessionId};

use crate::{Result, WireError};

/// Which kind of destination address (if any) a packet header carries.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Destination {
    /// Addressed to a single operational node id.
    Node(NodeId),
    /// Addressed to a multicast group.
    Group(GroupId),
}

/// Packet header flags.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct PacketHeaderFlags {
    /// Whether `source_node_id` is present (always true on the first
    /// message of a new unicast exchange; may be omitted afterward).
    pub has_source_node_id: bool,
}

/// The outer, always-plaintext header: session routing plus replay
/// counter.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PacketHeader {
    pub flags: PacketHeaderFlags,
    pub session_id: SessionId,
    pub message_counter: u32,
    pub source_node_id: Option<NodeId>,
    pub destination: Option<Destination>,
}

const DEST_NONE: u8 = 0;
const DEST_NODE: u8 = 1;
const DEST_GROUP: u8 = 2;

impl PacketHeader {
    fn dest_bits(&self) -> u8 {
        match self.destination {
            None => DEST_NONE,
            Some(Destination::Node(_)) => DEST_NODE,
            Some(Destination::Group(_)) => DEST_GROUP,
        }
    }

    /// Encode the packet header to its wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(15);
        let mut flags = 0u8;
        if self.flags.has_source_node_id {
            flags |= 0b0000_0001;
        }
        flags |= self.dest_bits() << 1;
        out.push(flags);
        out.extend_from_slice(&self.session_id.value().to_le_bytes());
        out.extend_from_slice(&self.message_counter.to_le_bytes());
        if let Some(node) = self.source_node_id {
            out.extend_from_slice(&node.value().to_le_bytes());
        }
        match self.destination {
            None => {}
            Some(Destination::Node(id)) => out.extend_from_slice(&id.value().to_le_bytes()),
            Some(Destination::Group(id)) => out.extend_from_slice(&id.value().to_le_bytes()),
        }
        out
    }

    /// Decode a packet header from the front of `buf`, returning the
    /// header and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 7 {
            return Err(WireError::Truncated {
                expected: 7,
                actual: buf.len(),
            });
        }
        let flags_byte = buf[0];
        let has_source_node_id = flags_byte & 0b0000_0001 != 0;
        let dest_bits = (flags_byte >> 1) & 0b0000_0011;

        let session_id = SessionId::from(u16::from_le_bytes([buf[1], buf[2]]));
        let message_counter = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);
        let mut offset = 7;

        let source_node_id = if has_source_node_id {
            let end = offset + 8;
            if buf.len() < end {
                return Err(WireError::Truncated {
                    expected: end,
                    actual: buf.len(),
                });
            }
            let id = u64::from_le_bytes(buf[offset..end].try_into().expect("8 bytes"));
            offset = end;
            Some(NodeId::from(id))
        } else {
            None
        };

        let destination = match dest_bits {
            DEST_NONE => None,
            DEST_NODE => {
                let end = offset + 8;
                if buf.len() < end {
                    return Err(WireError::Truncated {
                        expected: end,
                        actual: buf.len(),
                    });
                }
                let id = u64::from_le_bytes(buf[offset..end].try_into().expect("8 bytes"));
                offset = end;
                Some(Destination::Node(NodeId::from(id)))
            }
            DEST_GROUP => {
                let end = offset + 2;
                if buf.len() < end {
                    return Err(WireError::Truncated {
                        expected: end,
                        actual: buf.len(),
                    });
                }
                let id = u16::from_le_bytes(buf[offset..end].try_into().expect("2 bytes"));
                offset = end;
                Some(Destination::Group(GroupId::from(id)))
            }
            _ => return Err(WireError::UnsupportedTlvControl(flags_byte)),
        };

        Ok((
            PacketHeader {
                flags: PacketHeaderFlags { has_source_node_id },
                session_id,
                message_counter,
                source_node_id,
                destination,
            },
            offset,
        ))
    }
}

/// Payload header flags.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct PayloadHeaderFlags {
    /// Set by the exchange initiator on every message it sends.
    pub initiator: bool,
    /// This message itself acknowledges `acknowledged_counter`.
    pub acknowledgement: bool,
    /// The sender wants this message acknowledged.
    pub requires_ack: bool,
    /// The exchange uses MRP for this message (almost always true;
    /// group-addressed messages are the exception).
    pub reliable: bool,
}

/// The inner header identifying the exchange, protocol, and message
/// type, plus MRP piggyback state.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PayloadHeader {
    pub exchange_id: ExchangeId,
    pub protocol_id: ProtocolId,
    pub message_type: matter_types::MessageType,
    pub flags: PayloadHeaderFlags,
    pub acknowledged_counter: Option<u32>,
}

impl PayloadHeader {
    /// Encode the payload header to its wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12);
        let mut flags = 0u8;
        if self.flags.initiator {
            flags |= 0b0000_0001;
        }
        if self.flags.acknowledgement {
            flags |= 0b0000_0010;
        }
        if self.flags.requires_ack {
            flags |= 0b0000_0100;
        }
        if self.flags.reliable {
            flags |= 0b0000_1000;
        }
        out.push(flags);
        out.extend_from_slice(&self.exchange_id.value().to_le_bytes());
        out.extend_from_slice(&self.protocol_id.0.to_le_bytes());
        out.push(self.message_type.0);
        if let Some(counter) = self.acknowledged_counter {
            out.extend_from_slice(&counter.to_le_bytes());
        }
        out
    }

    /// Decode a payload header from the front of `buf`, returning the
    /// header and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 8 {
            return Err(WireError::Truncated {
                expected: 8,
                actual: buf.len(),
            });
        }
        let flags_byte = buf[0];
        let flags = PayloadHeaderFlags {
            initiator: flags_byte & 0b0000_0001 != 0,
            acknowledgement: flags_byte & 0b0000_0010 != 0,
            requires_ack: flags_byte & 0b0000_0100 != 0,
            reliable: flags_byte & 0b0000_1000 != 0,
        };
        let exchange_id = ExchangeId::from(u16::from_le_bytes([buf[1], buf[2]]));
        let protocol_id = ProtocolId(u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]));
        let message_type = matter_types::MessageType(buf[7]);
        let mut offset = 8;

        let acknowledged_counter = if flags.acknowledgement {
            let end = offset + 4;
            if buf.len() < end {
                return Err(WireError::Truncated {
                    expected: end,
                    actual: buf.len(),
                });
            }
            let counter = u32::from_le_bytes(buf[offset..end].try_into().expect("4 bytes"));
            offset = end;
            Some(counter)
        } else {
            None
        };

        Ok((
            PayloadHeader {
                exchange_id,
                protocol_id,
                message_type,
                flags,
                acknowledged_counter,
            },
            offset,
        ))
    }
}

/// A complete decoded Matter message: packet header, payload header,
/// and the application payload.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Message {
    pub packet_header: PacketHeader,
    pub payload_header: PayloadHeader,
    pub application_payload: Vec<u8>,
}

impl Message {
    /// Encode a message for transmission over an unsecured session (no
    /// AEAD protection). Fails with [`WireError::TooLarge`] if the
    /// encoded size exceeds `max_payload_size`.
    pub fn encode_unsecured(&self, max_payload_size: usize) -> Result<Vec<u8>> {
        let mut out = self.packet_header.encode();
        out.extend_from_slice(&self.payload_header.encode());
        out.extend_from_slice(&self.application_payload);
        if out.len() > max_payload_size {
            return Err(WireError::TooLarge {
                size: out.len(),
                max: max_payload_size,
            });
        }
        Ok(out)
    }

    /// Decode a message received over an unsecured session.
    pub fn decode_unsecured(buf: &[u8]) -> Result<Self> {
        let (packet_header, consumed) = PacketHeader::decode(buf)?;
        let rest = &buf[consumed..];
        let (payload_header, consumed2) = PayloadHeader::decode(rest)?;
        let application_payload = rest[consumed2..].to_vec();
        Ok(Message {
            packet_header,
            payload_header,
            application_payload,
        })
    }

    /// Split this message into the AEAD associated data (the encoded
    /// packet header) and the plaintext to encrypt (payload header +
    /// application payload), for a secure session send.
    pub fn split_for_secure(&self) -> (Vec<u8>, Vec<u8>) {
        let aad = self.packet_header.encode();
        let mut plaintext = self.payload_header.encode();
        plaintext.extend_from_slice(&self.application_payload);
        (aad, plaintext)
    }

    /// Reassemble a message from a packet header (decoded from the
    /// cleartext wire prefix) and the AEAD-decrypted plaintext
    /// (payload header + application payload).
    pub fn from_secure_parts(packet_header: PacketHeader, plaintext: &[u8]) -> Result<Self> {
        let (payload_header, consumed) = PayloadHeader::decode(plaintext)?;
        let application_payload = plaintext[consumed..].to_vec();
        Ok(Message {
            packet_header,
            payload_header,
            application_payload,
        })
    }
}
