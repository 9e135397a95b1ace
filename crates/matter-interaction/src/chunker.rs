//! DataReport chunking: splits a flat stream of attribute/event reports
//! produced by the data source into a sequence of `ReportData` message
//! bodies, each small enough to fit one transport datagram.
//!
//! List-valued attributes are represented upstream as one report item
//! per element (each carrying [`AttributePath::list_index`]); this
//! module treats every item as an atomic, already-minimal unit and
//! never splits one item across two messages. The "replace whole list"
//! vs "append one element" distinction that convention encodes is
//! entirely the data source's concern — the chunker just places items
//! into messages.

use std::collections::VecDeque;

use matter_wire::datamodel::{AttributeReportPayload, EventReportPayload, ReportItem};
use matter_wire::{Result, WireError};

/// Once remaining budget in the current message drops below this many
/// bytes, the chunker prefers to start a new message over cramming in
/// another item from a different cluster, so a reader processing
/// reports cluster-by-cluster rarely sees one cluster's attributes
/// split across messages purely by bad luck of the byte count.
pub const MIN_AVAILABLE_BYTES_BEFORE_SENDING: usize = 40;

/// Upper bound on how many report items one `ReportData` message
/// carries, independent of the byte budget, so a pathological data
/// source emitting many tiny items can't produce a message so large in
/// item count that downstream processing stalls.
pub const MAX_ITEMS_PER_MESSAGE: usize = 20;

/// Fixed bytes reserved per message for the `ReportData` envelope
/// itself (subscription id, interaction metadata) outside of the
/// report items.
const ENVELOPE_OVERHEAD: usize = 16;

/// One `ReportData` message's worth of items, plus whether more remain
/// queued behind it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportDataChunk {
    pub subscription_id: Option<u32>,
    pub attribute_reports: Vec<AttributeReportPayload>,
    pub event_reports: Vec<EventReportPayload>,
    pub more_chunked_messages: bool,
}

impl ReportDataChunk {
    pub fn is_empty(&self) -> bool {
        self.attribute_reports.is_empty() && self.event_reports.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self.subscription_id {
            Some(id) => {
                out.push(1);
                out.extend_from_slice(&id.to_le_bytes());
            }
            None => out.push(0),
        }
        out.extend_from_slice(&(self.attribute_reports.len() as u32).to_le_bytes());
        for report in &self.attribute_reports {
            out.extend_from_slice(&report.encode());
        }
        out.extend_from_slice(&(self.event_reports.len() as u32).to_le_bytes());
        for report in &self.event_reports {
            out.extend_from_slice(&report.encode());
        }
        out.push(u8::from(self.more_chunked_messages));
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(WireError::Truncated { expected: 1, actual: 0 });
        }
        let has_subscription = buf[0] != 0;
        let mut offset = 1;
        let subscription_id = if has_subscription {
            let end = offset + 4;
            if buf.len() < end {
                return Err(WireError::Truncated { expected: end, actual: buf.len() });
            }
            let id = u32::from_le_bytes(buf[offset..end].try_into().expect("4 bytes"));
            offset = end;
            Some(id)
        } else {
            None
        };

        let end = offset + 4;
        if buf.len() < end {
            return Err(WireError::Truncated { expected: end, actual: buf.len() });
        }
        let attr_count = u32::from_le_bytes(buf[offset..end].try_into().expect("4 bytes"));
        offset = end;
        let mut attribute_reports = Vec::with_capacity(attr_count as usize);
        for _ in 0..attr_count {
            let (report, consumed) = AttributeReportPayload::decode(&buf[offset..])?;
            offset += consumed;
            attribute_reports.push(report);
        }

        let end = offset + 4;
        if buf.len() < end {
            return Err(WireError::Truncated { expected: end, actual: buf.len() });
        }
        let event_count = u32::from_le_bytes(buf[offset..end].try_into().expect("4 bytes"));
        offset = end;
        let mut event_reports = Vec::with_capacity(event_count as usize);
        for _ in 0..event_count {
            let (report, consumed) = EventReportPayload::decode(&buf[offset..])?;
            offset += consumed;
            event_reports.push(report);
        }

        if buf.len() <= offset {
            return Err(WireError::Truncated { expected: offset + 1, actual: buf.len() });
        }
        let more_chunked_messages = buf[offset] != 0;

        Ok(ReportDataChunk {
            subscription_id,
            attribute_reports,
            event_reports,
            more_chunked_messages,
        })
    }
}

/// Splits a queue of report items into a sequence of size-bounded
/// `ReportData` chunks.
pub struct Chunker {
    pending: VecDeque<ReportItem>,
}

impl Chunker {
    pub fn new(items: Vec<ReportItem>) -> Self {
        Self {
            pending: items.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn item_len(item: &ReportItem) -> usize {
        match item {
            ReportItem::Attribute(a) => a.encoded_len(),
            ReportItem::Event(e) => e.encoded_len(),
        }
    }

    fn item_cluster(item: &ReportItem) -> Option<(u16, u32)> {
        match item {
            ReportItem::Attribute(a) => {
                let path = a.path();
                Some((path.endpoint, path.cluster))
            }
            ReportItem::Event(_) => None,
        }
    }

    /// Produce the next chunk, or `None` once every item has been
    /// placed into a previous chunk. `max_payload_bytes` is the
    /// transport's budget for this message's items (envelope framing
    /// above the Interaction Model is the caller's concern).
    ///
    /// Fails with [`WireError::TooLarge`] if the item at the head of
    /// the queue doesn't fit even alone in an empty chunk — such an
    /// item can never be placed in any message at this budget, so
    /// returning it would either loop forever re-emitting empty,
    /// never-draining chunks or silently drop it. Per spec, an
    /// oversized singleton report is a flow error, never a silent
    /// truncation.
    pub fn next_chunk(&mut self, max_payload_bytes: usize) -> Result<Option<ReportDataChunk>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let mut chunk = ReportDataChunk::default();
        let mut used = ENVELOPE_OVERHEAD;
        let mut current_cluster: Option<(u16, u32)> = None;

        while let Some(item) = self.pending.front() {
            let len = Self::item_len(item);
            if used + len > max_payload_bytes {
                if chunk.is_empty() {
                    return Err(WireError::TooLarge { size: len, max: max_payload_bytes });
                }
                break;
            }

            let item_cluster = Self::item_cluster(item);
            if let Some(cluster) = item_cluster {
                if let Some(active) = current_cluster {
                    if active != cluster
                        && !chunk.is_empty()
                        && max_payload_bytes.saturating_sub(used) < MIN_AVAILABLE_BYTES_BEFORE_SENDING
                    {
                        break;
                    }
                }
                current_cluster = Some(cluster);
            }

            let item = self.pending.pop_front().expect("front just peeked");
            used += len;
            match item {
                ReportItem::Attribute(a) => chunk.attribute_reports.push(a),
                ReportItem::Event(e) => chunk.event_reports.push(e),
            }

            if chunk.attribute_reports.len() + chunk.event_reports.len() >= MAX_ITEMS_PER_MESSAGE {
                break;
            }
        }

        chunk.more_chunked_messages = !self.pending.is_empty();
        Ok(Some(chunk))
    }

    /// Drain every remaining item into a sequence of chunks at once,
    /// for callers that don't need to interleave sending with
    /// production.
    pub fn drain_all(&mut self, max_payload_bytes: usize) -> Result<Vec<ReportDataChunk>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk(max_payload_bytes)? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matter_types::StatusCode;
    use matter_wire::datamodel::AttributePath;
    use matter_wire::tlv::TlvElement;

    fn path(endpoint: u16, cluster: u32, attribute: u32, list_index: Option<u16>) -> AttributePath {
        AttributePath {
            endpoint,
            cluster,
            attribute,
            list_index,
        }
    }

    fn value_report(path: AttributePath, value: TlvElement) -> ReportItem {
        ReportItem::Attribute(AttributeReportPayload::Value {
            path,
            data_version: 1,
            value,
        })
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let mut chunker = Chunker::new(Vec::new());
        assert!(chunker.next_chunk(1280).expect("no error").is_none());
    }

    #[test]
    fn small_report_set_fits_in_one_chunk() {
        let items = vec![
            value_report(path(1, 6, 0, None), TlvElement::Bool(true)),
            value_report(path(1, 6, 1, None), TlvElement::UInt(5)),
        ];
        let mut chunker = Chunker::new(items);
        let chunk = chunker.next_chunk(1280).expect("no error").expect("one chunk");
        assert_eq!(chunk.attribute_reports.len(), 2);
        assert!(!chunk.more_chunked_messages);
        assert!(chunker.next_chunk(1280).expect("no error").is_none());
    }

    #[test]
    fn oversized_list_splits_across_multiple_reportdata_messages() {
        // A 500-element list, each element its own chunk-append item,
        // forced through a small per-message byte budget.
        let items: Vec<ReportItem> = (0..500u16)
            .map(|i| value_report(path(1, 29, 0, Some(i)), TlvElement::UInt(i as u64)))
            .collect();
        let mut chunker = Chunker::new(items);

        let mut chunks = Vec::new();
        while let Some(chunk) = chunker.next_chunk(200).expect("no error") {
            chunks.push(chunk);
        }

        assert!(chunks.len() > 1, "500 list elements must not fit in one 200-byte message");
        let total_items: usize = chunks.iter().map(|c| c.attribute_reports.len()).sum();
        assert_eq!(total_items, 500);
        // Every chunk but the last claims more is coming.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.more_chunked_messages);
        }
        assert!(!chunks.last().unwrap().more_chunked_messages);
    }

    #[test]
    fn cluster_boundary_forces_a_new_chunk_near_the_budget_edge() {
        // One report from cluster 6 large enough to leave little room,
        // then a report from a different cluster (29). Even though the
        // second item's bytes would technically fit, starting a new
        // cluster with only crumbs of budget left should roll to a new
        // message instead.
        let big_value = TlvElement::Bytes(vec![0u8; 150]);
        let items = vec![
            value_report(path(1, 6, 0, None), big_value),
            value_report(path(1, 29, 0, None), TlvElement::Bool(true)),
        ];
        let mut chunker = Chunker::new(items);

        let first = chunker.next_chunk(200).expect("no error").expect("first chunk");
        assert_eq!(first.attribute_reports.len(), 1);
        assert!(first.more_chunked_messages);

        let second = chunker.next_chunk(200).expect("no error").expect("second chunk");
        assert_eq!(second.attribute_reports.len(), 1);
        assert!(!second.more_chunked_messages);
    }

    #[test]
    fn item_count_cap_splits_even_with_byte_room_to_spare() {
        let items: Vec<ReportItem> = (0..(MAX_ITEMS_PER_MESSAGE + 5))
            .map(|i| value_report(path(1, 6, i as u32, None), TlvElement::Bool(true)))
            .collect();
        let mut chunker = Chunker::new(items);

        let first = chunker.next_chunk(10_000).expect("no error").expect("first chunk");
        assert_eq!(first.attribute_reports.len(), MAX_ITEMS_PER_MESSAGE);
        assert!(first.more_chunked_messages);
    }

    #[test]
    fn status_reports_mix_with_value_reports() {
        let items = vec![
            value_report(path(1, 6, 0, None), TlvElement::Bool(true)),
            ReportItem::Attribute(AttributeReportPayload::Status {
                path: path(1, 6, 1, None),
                status: StatusCode::UNSUPPORTED_ENDPOINT,
            }),
        ];
        let mut chunker = Chunker::new(items);
        let chunk = chunker.next_chunk(1280).expect("no error").expect("chunk");
        assert_eq!(chunk.attribute_reports.len(), 2);
    }

    #[test]
    fn singleton_item_too_large_for_any_message_errors_instead_of_looping() {
        // No budget can ever fit this item, even alone in an empty
        // chunk; the chunker must fail it rather than emit empty
        // chunks forever.
        let huge_value = TlvElement::Bytes(vec![0u8; 1000]);
        let items = vec![value_report(path(1, 6, 0, None), huge_value)];
        let mut chunker = Chunker::new(items);

        let error = chunker.next_chunk(100).expect_err("oversized singleton must error");
        assert!(matches!(error, WireError::TooLarge { .. }));
    }

    #[test]
    fn report_data_chunk_roundtrips_through_the_wire() {
        let chunk = ReportDataChunk {
            subscription_id: Some(7),
            attribute_reports: vec![AttributeReportPayload::Value {
                path: path(1, 6, 0, None),
                data_version: 1,
                value: TlvElement::Bool(true),
            }],
            event_reports: vec![],
            more_chunked_messages: true,
        };
        let decoded = ReportDataChunk::decode(&chunk.encode()).expect("decode");
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn drain_all_collects_every_chunk() {
        let items: Vec<ReportItem> = (0..100u16)
            .map(|i| value_report(path(1, 29, 0, Some(i)), TlvElement::UInt(i as u64)))
            .collect();
        let mut chunker = Chunker::new(items);
        let chunks = chunker.drain_all(150).expect("no error");
        assert!(chunker.is_empty());
        let total: usize = chunks.iter().map(|c| c.attribute_reports.len()).sum();
        assert_eq!(total, 100);
    }
}
