//! A minimal in-memory attribute/event data source used only by the
//! CLI demo's `ReadRequest` smoke path.
//!
//! Real cluster business logic is an external collaborator (see
//! `matter-interaction::data_source`); this module exists purely so
//! the binary has something to read from without depending on one.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use matter_types::StatusCode;
use matter_wire::datamodel::{AttributePath, EventPath, EventReportPayload};
use matter_wire::tlv::TlvElement;

use matter_interaction::{AttributeDataSource, EventDataSource};
use matter_interaction::data_source::AttributeRead;

/// A single on/off-style endpoint with one boolean attribute, just
/// enough surface for the demo to read something real back.
pub struct DemoAttributeSource {
    values: Mutex<HashMap<(u16, u32, u32), AttributeRead>>,
}

impl DemoAttributeSource {
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert((1, 6, 0), AttributeRead::Value(TlvElement::Bool(false)));
        Self {
            values: Mutex::new(values),
        }
    }
}

impl Default for DemoAttributeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttributeDataSource for DemoAttributeSource {
    async fn data_version(&self, _path: &AttributePath) -> Option<u32> {
        Some(1)
    }

    async fn read(&self, path: &AttributePath) -> Result<Option<AttributeRead>, StatusCode> {
        Ok(self
            .values
            .lock()
            .expect("demo attribute lock poisoned")
            .get(&(path.endpoint, path.cluster, path.attribute))
            .cloned())
    }

    async fn write(&self, path: &AttributePath, value: TlvElement) -> StatusCode {
        self.values
            .lock()
            .expect("demo attribute lock poisoned")
            .insert((path.endpoint, path.cluster, path.attribute), AttributeRead::Value(value));
        StatusCode::SUCCESS
    }
}

/// No events in the demo; kept only so the server handler has a
/// concrete `EventDataSource` to hold.
pub struct DemoEventSource;

#[async_trait]
impl EventDataSource for DemoEventSource {
    async fn events_since(&self, _path: &EventPath, _since_event_number: u64) -> Vec<EventReportPayload> {
        Vec::new()
    }
}
