//! A small self-describing TLV (tag, type, length, value) codec.
//!
//! This is not a general Matter TLV schema compiler (context tags,
//! anonymous tags, nested structures with field numbering) — that
//! belongs to the data-model schema registry the core treats as an
//! external collaborator. It is the minimal structural subset the
//! Interaction Model needs to carry attribute/event values and measure
//! their encoded size for the DataReport chunker.

use crate::{Result, WireError};

const KIND_UINT: u8 = 0;
const KIND_INT: u8 = 1;
const KIND_BOOL: u8 = 2;
const KIND_BYTES: u8 = 3;
const KIND_UTF8: u8 = 4;
const KIND_LIST: u8 = 5;
const KIND_NULL: u8 = 6;

const WIDTH_U8: u8 = 0;
const WIDTH_U16: u8 = 1;
const WIDTH_U32: u8 = 2;
const WIDTH_U64: u8 = 3;

/// A TLV-encodable value. Covers the shapes attribute and event payload
/// data actually take: scalars, byte/text strings, and (one level of)
/// lists.
#[derive(Clone, Debug, PartialEq)]
pub enum TlvElement {
    UInt(u64),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
    Utf8(String),
    List(Vec<TlvElement>),
    Null,
}

fn control_byte(kind: u8, width: u8) -> u8 {
    (kind << 4) | width
}

impl TlvElement {
    /// Append this element's encoding to `out`.
    pub fn encode_to(&self, out: &mut Vec<u8>) {
        match self {
            TlvElement::UInt(v) => {
                if *v <= u8::MAX as u64 {
                    out.push(control_byte(KIND_UINT, WIDTH_U8));
                    out.push(*v as u8);
                } else if *v <= u16::MAX as u64 {
                    out.push(control_byte(KIND_UINT, WIDTH_U16));
                    out.extend_from_slice(&(*v as u16).to_le_bytes());
                } else if *v <= u32::MAX as u64 {
                    out.push(control_byte(KIND_UINT, WIDTH_U32));
                    out.extend_from_slice(&(*v as u32).to_le_bytes());
                } else {
                    out.push(control_byte(KIND_UINT, WIDTH_U64));
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            TlvElement::Int(v) => {
                out.push(control_byte(KIND_INT, WIDTH_U64));
                out.extend_from_slice(&v.to_le_bytes());
            }
            TlvElement::Bool(b) => {
                out.push(control_byte(KIND_BOOL, 0));
                out.push(u8::from(*b));
            }
            TlvElement::Bytes(bytes) => {
                out.push(control_byte(KIND_BYTES, 0));
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            TlvElement::Utf8(s) => {
                out.push(control_byte(KIND_UTF8, 0));
                let bytes = s.as_bytes();
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            TlvElement::List(items) => {
                out.push(control_byte(KIND_LIST, 0));
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.encode_to(out);
                }
            }
            TlvElement::Null => {
                out.push(control_byte(KIND_NULL, 0));
            }
        }
    }

    /// Encode this element to a standalone byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }

    /// Exact encoded size in bytes, derived by actually encoding rather
    /// than estimating so chunking decisions never drift from the bytes
    /// actually sent.
    pub fn encoded_len(&self) -> usize {
        // `encode` does allocate a scratch buffer; correctness over an
        // estimate matters more than the allocation here since the
        // chunker calls this per candidate report, not per byte.
        self.encode().len()
    }

    /// Decode one element from the front of `buf`, returning it and the
    /// number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.is_empty() {
            return Err(WireError::Truncated { expected: 1, actual: 0 });
        }
        let control = buf[0];
        let kind = control >> 4;
        let width = control & 0x0f;
        let mut offset = 1;

        let value = match kind {
            KIND_UINT => {
                let (v, consumed) = decode_uint(&buf[offset..], width)?;
                offset += consumed;
                TlvElement::UInt(v)
            }
            KIND_INT => {
                let end = offset + 8;
                if buf.len() < end {
                    return Err(WireError::Truncated { expected: end, actual: buf.len() });
                }
                let v = i64::from_le_bytes(buf[offset..end].try_into().expect("8 bytes"));
                offset = end;
                TlvElement::Int(v)
            }
            KIND_BOOL => {
                if buf.len() < offset + 1 {
                    return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
                }
                let v = buf[offset] != 0;
                offset += 1;
                TlvElement::Bool(v)
            }
            KIND_BYTES | KIND_UTF8 => {
                let end = offset + 4;
                if buf.len() < end {
                    return Err(WireError::Truncated { expected: end, actual: buf.len() });
                }
                let len = u32::from_le_bytes(buf[offset..end].try_into().expect("4 bytes")) as usize;
                offset = end;
                let data_end = offset + len;
                if buf.len() < data_end {
                    return Err(WireError::MalformedLength);
                }
                let data = &buf[offset..data_end];
                offset = data_end;
                if kind == KIND_BYTES {
                    TlvElement::Bytes(data.to_vec())
                } else {
                    TlvElement::Utf8(
                        String::from_utf8(data.to_vec()).map_err(|_| WireError::MalformedLength)?,
                    )
                }
            }
            KIND_LIST => {
                let end = offset + 4;
                if buf.len() < end {
                    return Err(WireError::Truncated { expected: end, actual: buf.len() });
                }
                let count = u32::from_le_bytes(buf[offset..end].try_into().expect("4 bytes"));
                offset = end;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (item, consumed) = TlvElement::decode(&buf[offset..])?;
                    offset += consumed;
                    items.push(item);
                }
                TlvElement::List(items)
            }
            KIND_NULL => TlvElement::Null,
            _ => return Err(WireError::UnsupportedTlvControl(control)),
        };

        Ok((value, offset))
    }
}

fn decode_uint(buf: &[u8], width: u8) -> Result<(u64, usize)> {
    let size = match width {
        WIDTH_U8 => 1,
        WIDTH_U16 => 2,
        WIDTH_U32 => 4,
        WIDTH_U64 => 8,
        _ => return Err(WireError::UnsupportedTlvControl(width)),
    };
    if buf.len() < size {
        return Err(WireError::Truncated { expected: size, actual: buf.len() });
    }
    let v = match size {
        1 => buf[0] as u64,
        2 => u16::from_le_bytes(buf[..2].try_into().expect("2 bytes")) as u64,
        4 => u32::from_le_bytes(buf[..4].try_into().expect("4 bytes")) as u64,
        8 => u64::from_le_bytes(buf[..8].try_into().expect("8 bytes")),
        _ => unreachable!("size is one of 1,2,4,8"),
    };
    Ok((v, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_roundtrip_picks_smallest_width() {
        for v in [0u64, 200, 5000, 100_000, 5_000_000_000] {
            let el = TlvElement::UInt(v);
            let bytes = el.encode();
            let (decoded, consumed) = TlvElement::decode(&bytes).expect("decode");
            assert_eq!(consumed, bytes.len());
            assert_eq!(decoded, el);
        }
        // Smallest values use the smallest width.
        assert_eq!(TlvElement::UInt(5).encoded_len(), 2);
        assert_eq!(TlvElement::UInt(100_000).encoded_len(), 5);
    }

    #[test]
    fn bytes_and_utf8_roundtrip() {
        let b = TlvElement::Bytes(vec![1, 2, 3, 4]);
        let (decoded, _) = TlvElement::decode(&b.encode()).expect("decode");
        assert_eq!(decoded, b);

        let s = TlvElement::Utf8("hello matter".to_string());
        let (decoded, _) = TlvElement::decode(&s.encode()).expect("decode");
        assert_eq!(decoded, s);
    }

    #[test]
    fn list_roundtrip() {
        let list = TlvElement::List(vec![TlvElement::UInt(1), TlvElement::UInt(2), TlvElement::Bool(true)]);
        let (decoded, consumed) = TlvElement::decode(&list.encode()).expect("decode");
        assert_eq!(consumed, list.encode().len());
        assert_eq!(decoded, list);
    }

    #[test]
    fn empty_list_has_small_fixed_overhead() {
        let empty = TlvElement::List(vec![]);
        assert_eq!(empty.encoded_len(), 5); // control byte + 4-byte count
    }

    #[test]
    fn null_roundtrip() {
        let (decoded, consumed) = TlvElement::decode(&TlvElement::Null.encode()).expect("decode");
        assert_eq!(consumed, 1);
        assert_eq!(decoded, TlvElement::Null);
    }

    #[test]
    fn truncated_input_errors() {
        let bytes = TlvElement::UInt(5_000_000_000).encode();
        assert!(TlvElement::decode(&bytes[..bytes.len() - 1]).is_err());
    }
}
