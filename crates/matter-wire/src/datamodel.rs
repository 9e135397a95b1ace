//! Data-model wire structures: attribute/event paths and reports, and
//! the `StatusResponse` payload.
//!
//! Attribute/command/event *metadata* lookup (what clusters exist, what
//! their attributes mean) is the external data-model schema registry;
//! this module only carries the identifiers and TLV values the
//! Interaction Model moves over the wire.

use matter_types::StatusCode;

use crate::tlv::TlvElement;
use crate::{Result, WireError};

/// `{endpoint, cluster, attribute, listIndex?}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributePath {
    pub endpoint: u16,
    pub cluster: u32,
    pub attribute: u32,
    /// Present only on a list-chunking "append one member" report; a
    /// full-list report (including the "replace with empty list"
    /// marker) omits it.
    pub list_index: Option<u16>,
}

impl AttributePath {
    /// Whether `other` addresses the same `(endpoint, cluster)` pair,
    /// used by the chunker to decide whether crossing into a new
    /// cluster should flag the pending queue for another pass.
    pub fn same_cluster(&self, other: &AttributePath) -> bool {
        self.endpoint == other.endpoint && self.cluster == other.cluster
    }

    pub fn same_attribute(&self, other: &AttributePath) -> bool {
        self.endpoint == other.endpoint && self.cluster == other.cluster && self.attribute == other.attribute
    }

    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.endpoint.to_le_bytes());
        out.extend_from_slice(&self.cluster.to_le_bytes());
        out.extend_from_slice(&self.attribute.to_le_bytes());
        match self.list_index {
            Some(idx) => {
                out.push(1);
                out.extend_from_slice(&idx.to_le_bytes());
            }
            None => out.push(0),
        }
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 11 {
            return Err(WireError::Truncated { expected: 11, actual: buf.len() });
        }
        let endpoint = u16::from_le_bytes(buf[0..2].try_into().expect("2 bytes"));
        let cluster = u32::from_le_bytes(buf[2..6].try_into().expect("4 bytes"));
        let attribute = u32::from_le_bytes(buf[6..10].try_into().expect("4 bytes"));
        let has_index = buf[10] != 0;
        let mut offset = 11;
        let list_index = if has_index {
            let end = offset + 2;
            if buf.len() < end {
                return Err(WireError::Truncated { expected: end, actual: buf.len() });
            }
            let idx = u16::from_le_bytes(buf[offset..end].try_into().expect("2 bytes"));
            offset = end;
            Some(idx)
        } else {
            None
        };
        Ok((
            AttributePath {
                endpoint,
                cluster,
                attribute,
                list_index,
            },
            offset,
        ))
    }
}

/// `{endpoint, cluster, event}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventPath {
    pub endpoint: u16,
    pub cluster: u32,
    pub event: u32,
}

impl EventPath {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.endpoint.to_le_bytes());
        out.extend_from_slice(&self.cluster.to_le_bytes());
        out.extend_from_slice(&self.event.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 10 {
            return Err(WireError::Truncated { expected: 10, actual: buf.len() });
        }
        let endpoint = u16::from_le_bytes(buf[0..2].try_into().expect("2 bytes"));
        let cluster = u32::from_le_bytes(buf[2..6].try_into().expect("4 bytes"));
        let event = u32::from_le_bytes(buf[6..10].try_into().expect("4 bytes"));
        Ok((EventPath { endpoint, cluster, event }, 10))
    }
}

/// Event priority (affects retention/delivery ordering in the
/// application's event store; opaque to the core beyond carrying it).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventPriority {
    Debug,
    Info,
    Critical,
}

impl EventPriority {
    fn to_byte(self) -> u8 {
        match self {
            EventPriority::Debug => 0,
            EventPriority::Info => 1,
            EventPriority::Critical => 2,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(EventPriority::Debug),
            1 => Ok(EventPriority::Info),
            2 => Ok(EventPriority::Critical),
            other => Err(WireError::UnsupportedTlvControl(other)),
        }
    }
}

/// One attribute report: either a value (full or a single list-chunk
/// element) or a status.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeReportPayload {
    Value {
        path: AttributePath,
        data_version: u32,
        value: TlvElement,
    },
    Status {
        path: AttributePath,
        status: StatusCode,
    },
}

const AR_TAG_VALUE: u8 = 0;
const AR_TAG_STATUS: u8 = 1;

impl AttributeReportPayload {
    pub fn path(&self) -> &AttributePath {
        match self {
            AttributeReportPayload::Value { path, .. } => path,
            AttributeReportPayload::Status { path, .. } => path,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            AttributeReportPayload::Value { path, data_version, value } => {
                out.push(AR_TAG_VALUE);
                path.encode_to(&mut out);
                out.extend_from_slice(&data_version.to_le_bytes());
                value.encode_to(&mut out);
            }
            AttributeReportPayload::Status { path, status } => {
                out.push(AR_TAG_STATUS);
                path.encode_to(&mut out);
                out.push(status.0);
            }
        }
        out
    }

    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.is_empty() {
            return Err(WireError::Truncated { expected: 1, actual: 0 });
        }
        let tag = buf[0];
        let (path, consumed) = AttributePath::decode(&buf[1..])?;
        let mut offset = 1 + consumed;
        match tag {
            AR_TAG_VALUE => {
                let end = offset + 4;
                if buf.len() < end {
                    return Err(WireError::Truncated { expected: end, actual: buf.len() });
                }
                let data_version = u32::from_le_bytes(buf[offset..end].try_into().expect("4 bytes"));
                offset = end;
                let (value, consumed3) = TlvElement::decode(&buf[offset..])?;
                offset += consumed3;
                Ok((
                    AttributeReportPayload::Value { path, data_version, value },
                    offset,
                ))
            }
            AR_TAG_STATUS => {
                if buf.len() <= offset {
                    return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
                }
                let status = StatusCode(buf[offset]);
                offset += 1;
                Ok((AttributeReportPayload::Status { path, status }, offset))
            }
            other => Err(WireError::UnsupportedTlvControl(other)),
        }
    }
}

/// One event report: either an event occurrence or a status.
#[derive(Clone, Debug, PartialEq)]
pub enum EventReportPayload {
    Event {
        path: EventPath,
        event_number: u64,
        priority: EventPriority,
        timestamp: u64,
        payload: TlvElement,
    },
    Status {
        path: EventPath,
        status: StatusCode,
    },
}

const ER_TAG_EVENT: u8 = 0;
const ER_TAG_STATUS: u8 = 1;

impl EventReportPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            EventReportPayload::Event {
                path,
                event_number,
                priority,
                timestamp,
                payload,
            } => {
                out.push(ER_TAG_EVENT);
                path.encode_to(&mut out);
                out.extend_from_slice(&event_number.to_le_bytes());
                out.push(priority.to_byte());
                out.extend_from_slice(&timestamp.to_le_bytes());
                payload.encode_to(&mut out);
            }
            EventReportPayload::Status { path, status } => {
                out.push(ER_TAG_STATUS);
                path.encode_to(&mut out);
                out.push(status.0);
            }
        }
        out
    }

    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.is_empty() {
            return Err(WireError::Truncated { expected: 1, actual: 0 });
        }
        let tag = buf[0];
        let (path, consumed) = EventPath::decode(&buf[1..])?;
        let mut offset = 1 + consumed;
        match tag {
            ER_TAG_EVENT => {
                let end = offset + 8;
                if buf.len() < end {
                    return Err(WireError::Truncated { expected: end, actual: buf.len() });
                }
                let event_number = u64::from_le_bytes(buf[offset..end].try_into().expect("8 bytes"));
                offset = end;
                if buf.len() <= offset {
                    return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
                }
                let priority = EventPriority::from_byte(buf[offset])?;
                offset += 1;
                let end = offset + 8;
                if buf.len() < end {
                    return Err(WireError::Truncated { expected: end, actual: buf.len() });
                }
                let timestamp = u64::from_le_bytes(buf[offset..end].try_into().expect("8 bytes"));
                offset = end;
                let (payload, consumed2) = TlvElement::decode(&buf[offset..])?;
                offset += consumed2;
                Ok((
                    EventReportPayload::Event {
                        path,
                        event_number,
                        priority,
                        timestamp,
                        payload,
                    },
                    offset,
                ))
            }
            ER_TAG_STATUS => {
                if buf.len() <= offset {
                    return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
                }
                let status = StatusCode(buf[offset]);
                offset += 1;
                Ok((EventReportPayload::Status { path, status }, offset))
            }
            other => Err(WireError::UnsupportedTlvControl(other)),
        }
    }
}

/// A single report item, as the application-layer iterator produces
/// them to the DataReport chunker.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportItem {
    Attribute(AttributeReportPayload),
    Event(EventReportPayload),
}

/// `{endpoint, cluster, command}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPath {
    pub endpoint: u16,
    pub cluster: u32,
    pub command: u32,
}

impl CommandPath {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.endpoint.to_le_bytes());
        out.extend_from_slice(&self.cluster.to_le_bytes());
        out.extend_from_slice(&self.command.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 10 {
            return Err(WireError::Truncated { expected: 10, actual: buf.len() });
        }
        let endpoint = u16::from_le_bytes(buf[0..2].try_into().expect("2 bytes"));
        let cluster = u32::from_le_bytes(buf[2..6].try_into().expect("4 bytes"));
        let command = u32::from_le_bytes(buf[6..10].try_into().expect("4 bytes"));
        Ok((CommandPath { endpoint, cluster, command }, 10))
    }
}

fn encode_vec<T>(out: &mut Vec<u8>, items: &[T], encode_item: impl Fn(&T, &mut Vec<u8>)) {
    out.extend_from_slice(&(items.len() as u32).to_le_bytes());
    for item in items {
        encode_item(item, out);
    }
}

fn decode_vec<T>(buf: &[u8], decode_item: impl Fn(&[u8]) -> Result<(T, usize)>) -> Result<(Vec<T>, usize)> {
    if buf.len() < 4 {
        return Err(WireError::Truncated { expected: 4, actual: buf.len() });
    }
    let count = u32::from_le_bytes(buf[0..4].try_into().expect("4 bytes"));
    let mut offset = 4;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (item, consumed) = decode_item(&buf[offset..])?;
        offset += consumed;
        items.push(item);
    }
    Ok((items, offset))
}

fn encode_bool(b: bool) -> u8 {
    u8::from(b)
}

/// A `ReadRequest`: the attribute/event paths to read, plus any data
/// version filters used to skip clusters the client already has
/// current data for.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadRequestPayload {
    pub attribute_requests: Vec<AttributePath>,
    pub event_requests: Vec<EventPath>,
    /// `(cluster path, known data version)` pairs; a cluster whose
    /// current version matches is skipped entirely by the data source.
    pub data_version_filters: Vec<(AttributePath, u32)>,
    pub fabric_filtered: bool,
}

impl ReadRequestPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_vec(&mut out, &self.attribute_requests, |p, out| p.encode_to(out));
        encode_vec(&mut out, &self.event_requests, |p, out| p.encode_to(out));
        encode_vec(&mut out, &self.data_version_filters, |(path, version), out| {
            path.encode_to(out);
            out.extend_from_slice(&version.to_le_bytes());
        });
        out.push(encode_bool(self.fabric_filtered));
        out
    }

    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (attribute_requests, consumed) = decode_vec(buf, AttributePath::decode)?;
        let mut offset = consumed;
        let (event_requests, consumed) = decode_vec(&buf[offset..], EventPath::decode)?;
        offset += consumed;
        let (data_version_filters, consumed) = decode_vec(&buf[offset..], |b| {
            let (path, used) = AttributePath::decode(b)?;
            let end = used + 4;
            if b.len() < end {
                return Err(WireError::Truncated { expected: end, actual: b.len() });
            }
            let version = u32::from_le_bytes(b[used..end].try_into().expect("4 bytes"));
            Ok(((path, version), end))
        })?;
        offset += consumed;
        if buf.len() <= offset {
            return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
        }
        let fabric_filtered = buf[offset] != 0;
        Ok(ReadRequestPayload {
            attribute_requests,
            event_requests,
            data_version_filters,
            fabric_filtered,
        })
    }

    /// Drop filters from the tail until the encoded request fits
    /// `max_payload_bytes`, preserving first-to-last drop order.
    pub fn shorten_data_version_filters_to_fit(&mut self, max_payload_bytes: usize) {
        while self.encoded_len() > max_payload_bytes && !self.data_version_filters.is_empty() {
            self.data_version_filters.pop();
        }
    }
}

/// A `WriteRequest`: one or more `(path, value)` writes.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRequestPayload {
    pub writes: Vec<(AttributePath, TlvElement)>,
    pub suppress_response: bool,
    pub timed_request: bool,
}

impl WriteRequestPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_vec(&mut out, &self.writes, |(path, value), out| {
            path.encode_to(out);
            value.encode_to(out);
        });
        out.push(encode_bool(self.suppress_response));
        out.push(encode_bool(self.timed_request));
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (writes, consumed) = decode_vec(buf, |b| {
            let (path, used) = AttributePath::decode(b)?;
            let (value, used2) = TlvElement::decode(&b[used..])?;
            Ok(((path, value), used + used2))
        })?;
        let mut offset = consumed;
        if buf.len() < offset + 2 {
            return Err(WireError::Truncated { expected: offset + 2, actual: buf.len() });
        }
        let suppress_response = buf[offset] != 0;
        offset += 1;
        let timed_request = buf[offset] != 0;
        Ok(WriteRequestPayload {
            writes,
            suppress_response,
            timed_request,
        })
    }
}

/// A `WriteResponse`: one status per write, in request order.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteResponsePayload {
    pub results: Vec<AttributeReportPayload>,
}

impl WriteResponsePayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_vec(&mut out, &self.results, |r, out| out.extend_from_slice(&r.encode()));
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (results, consumed) = decode_vec(buf, AttributeReportPayload::decode)?;
        let _ = consumed;
        Ok(WriteResponsePayload { results })
    }
}

/// A `SubscribeRequest`.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscribeRequestPayload {
    pub attribute_requests: Vec<AttributePath>,
    pub event_requests: Vec<EventPath>,
    pub min_interval_floor_seconds: u16,
    pub max_interval_ceiling_seconds: u16,
    pub keep_subscriptions: bool,
}

impl SubscribeRequestPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_vec(&mut out, &self.attribute_requests, |p, out| p.encode_to(out));
        encode_vec(&mut out, &self.event_requests, |p, out| p.encode_to(out));
        out.extend_from_slice(&self.min_interval_floor_seconds.to_le_bytes());
        out.extend_from_slice(&self.max_interval_ceiling_seconds.to_le_bytes());
        out.push(encode_bool(self.keep_subscriptions));
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (attribute_requests, consumed) = decode_vec(buf, AttributePath::decode)?;
        let mut offset = consumed;
        let (event_requests, consumed) = decode_vec(&buf[offset..], EventPath::decode)?;
        offset += consumed;
        if buf.len() < offset + 5 {
            return Err(WireError::Truncated { expected: offset + 5, actual: buf.len() });
        }
        let min_interval_floor_seconds = u16::from_le_bytes(buf[offset..offset + 2].try_into().expect("2 bytes"));
        offset += 2;
        let max_interval_ceiling_seconds = u16::from_le_bytes(buf[offset..offset + 2].try_into().expect("2 bytes"));
        offset += 2;
        let keep_subscriptions = buf[offset] != 0;
        Ok(SubscribeRequestPayload {
            attribute_requests,
            event_requests,
            min_interval_floor_seconds,
            max_interval_ceiling_seconds,
            keep_subscriptions,
        })
    }
}

/// A `SubscribeResponse`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscribeResponsePayload {
    pub subscription_id: u32,
    pub max_interval_seconds: u16,
}

impl SubscribeResponsePayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.subscription_id.to_le_bytes());
        out.extend_from_slice(&self.max_interval_seconds.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 6 {
            return Err(WireError::Truncated { expected: 6, actual: buf.len() });
        }
        let subscription_id = u32::from_le_bytes(buf[0..4].try_into().expect("4 bytes"));
        let max_interval_seconds = u16::from_le_bytes(buf[4..6].try_into().expect("2 bytes"));
        Ok(SubscribeResponsePayload {
            subscription_id,
            max_interval_seconds,
        })
    }
}

/// An `InvokeRequest`: one command invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeRequestPayload {
    pub path: CommandPath,
    pub fields: TlvElement,
    pub timed_request: bool,
}

impl InvokeRequestPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.path.encode_to(&mut out);
        self.fields.encode_to(&mut out);
        out.push(encode_bool(self.timed_request));
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (path, consumed) = CommandPath::decode(buf)?;
        let (fields, consumed2) = TlvElement::decode(&buf[consumed..])?;
        let offset = consumed + consumed2;
        if buf.len() <= offset {
            return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
        }
        let timed_request = buf[offset] != 0;
        Ok(InvokeRequestPayload {
            path,
            fields,
            timed_request,
        })
    }
}

/// An `InvokeResponse`: the command's outcome, with an optional data
/// payload for commands that return a value.
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeResponsePayload {
    pub path: CommandPath,
    pub status: StatusCode,
    pub response: Option<TlvElement>,
}

impl InvokeResponsePayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.path.encode_to(&mut out);
        out.push(self.status.0);
        match &self.response {
            Some(value) => {
                out.push(1);
                value.encode_to(&mut out);
            }
            None => out.push(0),
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (path, consumed) = CommandPath::decode(buf)?;
        let mut offset = consumed;
        if buf.len() <= offset {
            return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
        }
        let status = StatusCode(buf[offset]);
        offset += 1;
        if buf.len() <= offset {
            return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
        }
        let has_response = buf[offset] != 0;
        offset += 1;
        let response = if has_response {
            let (value, _) = TlvElement::decode(&buf[offset..])?;
            Some(value)
        } else {
            None
        };
        Ok(InvokeResponsePayload { path, status, response })
    }
}

/// A `TimedRequest`: the deadline (in milliseconds) for the request
/// that must follow on this exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedRequestPayload {
    pub timeout_ms: u16,
}

impl TimedRequestPayload {
    pub fn encode(&self) -> Vec<u8> {
        self.timeout_ms.to_le_bytes().to_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(WireError::Truncated { expected: 2, actual: buf.len() });
        }
        Ok(TimedRequestPayload {
            timeout_ms: u16::from_le_bytes(buf[0..2].try_into().expect("2 bytes")),
        })
    }
}

/// The `StatusResponse` payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusResponsePayload {
    pub status: StatusCode,
}

impl StatusResponsePayload {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.status.0]
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(WireError::Truncated { expected: 1, actual: 0 });
        }
        Ok(StatusResponsePayload { status: StatusCode(buf[0]) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(endpoint: u16, cluster: u32, attribute: u32) -> AttributePath {
        AttributePath {
            endpoint,
            cluster,
            attribute,
            list_index: None,
        }
    }

    #[test]
    fn attribute_value_report_roundtrip() {
        let report = AttributeReportPayload::Value {
            path: path(1, 6, 0),
            data_version: 5,
            value: TlvElement::Bool(true),
        };
        let bytes = report.encode();
        let (decoded, consumed) = AttributeReportPayload::decode(&bytes).expect("decode");
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, report);
    }

    #[test]
    fn attribute_status_report_roundtrip() {
        let report = AttributeReportPayload::Status {
            path: path(1, 6, 0),
            status: StatusCode::UNSUPPORTED_ENDPOINT,
        };
        let (decoded, _) = AttributeReportPayload::decode(&report.encode()).expect("decode");
        assert_eq!(decoded, report);
    }

    #[test]
    fn list_index_roundtrips() {
        let mut p = path(2, 29, 1);
        p.list_index = Some(7);
        let report = AttributeReportPayload::Value {
            path: p.clone(),
            data_version: 1,
            value: TlvElement::UInt(42),
        };
        let (decoded, _) = AttributeReportPayload::decode(&report.encode()).expect("decode");
        assert_eq!(decoded.path().list_index, Some(7));
    }

    #[test]
    fn event_report_roundtrip() {
        let report = EventReportPayload::Event {
            path: EventPath { endpoint: 1, cluster: 40, event: 0 },
            event_number: 123,
            priority: EventPriority::Critical,
            timestamp: 99,
            payload: TlvElement::Utf8("evt".into()),
        };
        let (decoded, consumed) = EventReportPayload::decode(&report.encode()).expect("decode");
        assert_eq!(consumed, report.encode().len());
        assert_eq!(decoded, report);
    }

    #[test]
    fn status_response_roundtrip() {
        let resp = StatusResponsePayload { status: StatusCode::SUCCESS };
        let decoded = StatusResponsePayload::decode(&resp.encode()).expect("decode");
        assert_eq!(decoded, resp);
    }

    #[test]
    fn same_cluster_and_same_attribute() {
        let a = path(1, 6, 0);
        let b = path(1, 6, 1);
        let c = path(1, 7, 0);
        assert!(a.same_cluster(&b));
        assert!(!a.same_cluster(&c));
        assert!(!a.same_attribute(&b));
    }

    #[test]
    fn read_request_roundtrip() {
        let req = ReadRequestPayload {
            attribute_requests: vec![path(1, 6, 0)],
            event_requests: vec![EventPath { endpoint: 1, cluster: 40, event: 0 }],
            data_version_filters: vec![(path(1, 6, 0), 9)],
            fabric_filtered: true,
        };
        let decoded = ReadRequestPayload::decode(&req.encode()).expect("decode");
        assert_eq!(decoded, req);
    }

    #[test]
    fn read_request_shortens_filters_to_fit() {
        let mut req = ReadRequestPayload {
            attribute_requests: vec![],
            event_requests: vec![],
            data_version_filters: vec![(path(1, 6, 0), 1), (path(1, 7, 0), 2), (path(1, 8, 0), 3)],
            fabric_filtered: false,
        };
        let full_len = req.encoded_len();
        req.shorten_data_version_filters_to_fit(full_len - 1);
        assert_eq!(req.data_version_filters.len(), 2);
        assert_eq!(req.data_version_filters[0].1, 1);
    }

    #[test]
    fn write_request_roundtrip() {
        let req = WriteRequestPayload {
            writes: vec![(path(1, 6, 0), TlvElement::Bool(true))],
            suppress_response: false,
            timed_request: true,
        };
        let decoded = WriteRequestPayload::decode(&req.encode()).expect("decode");
        assert_eq!(decoded, req);
    }

    #[test]
    fn write_response_roundtrip() {
        let resp = WriteResponsePayload {
            results: vec![AttributeReportPayload::Status {
                path: path(1, 6, 0),
                status: StatusCode::SUCCESS,
            }],
        };
        let decoded = WriteResponsePayload::decode(&resp.encode()).expect("decode");
        assert_eq!(decoded, resp);
    }

    #[test]
    fn subscribe_request_and_response_roundtrip() {
        let req = SubscribeRequestPayload {
            attribute_requests: vec![path(1, 6, 0)],
            event_requests: vec![],
            min_interval_floor_seconds: 1,
            max_interval_ceiling_seconds: 60,
            keep_subscriptions: false,
        };
        let decoded = SubscribeRequestPayload::decode(&req.encode()).expect("decode");
        assert_eq!(decoded, req);

        let resp = SubscribeResponsePayload {
            subscription_id: 42,
            max_interval_seconds: 60,
        };
        let decoded = SubscribeResponsePayload::decode(&resp.encode()).expect("decode");
        assert_eq!(decoded, resp);
    }

    #[test]
    fn invoke_request_and_response_roundtrip() {
        let cmd_path = CommandPath { endpoint: 1, cluster: 6, command: 0 };
        let req = InvokeRequestPayload {
            path: cmd_path.clone(),
            fields: TlvElement::Null,
            timed_request: false,
        };
        let decoded = InvokeRequestPayload::decode(&req.encode()).expect("decode");
        assert_eq!(decoded, req);

        let resp = InvokeResponsePayload {
            path: cmd_path,
            status: StatusCode::SUCCESS,
            response: Some(TlvElement::UInt(7)),
        };
        let decoded = InvokeResponsePayload::decode(&resp.encode()).expect("decode");
        assert_eq!(decoded, resp);
    }

    #[test]
    fn timed_request_roundtrip() {
        let req = TimedRequestPayload { timeout_ms: 5000 };
        let decoded = TimedRequestPayload::decode(&req.encode()).expect("decode");
        assert_eq!(decoded, req);
    }
}
