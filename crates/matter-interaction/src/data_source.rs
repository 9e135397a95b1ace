//! The seam between this crate's wire/chunking machinery and whatever
//! owns real cluster state.
//!
//! Neither trait here knows what a cluster *means*; they only expose
//! enough for [`crate::server::InteractionServerHandler`] to gather
//! the report items a Read/Subscribe needs and apply the writes an
//! Invoke/Write requires, against whichever endpoint/cluster/attribute
//! combination the request named.

use async_trait::async_trait;
use matter_types::StatusCode;

use matter_wire::datamodel::{AttributePath, EventPath, EventReportPayload};
use matter_wire::tlv::TlvElement;

/// One concrete read of an attribute: either its current value (for a
/// scalar) or, for a list, every element as its own chunk-append item
/// so the chunker can place them independently.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeRead {
    Value(TlvElement),
    List(Vec<TlvElement>),
}

/// Owns current attribute state for some set of endpoints/clusters.
/// One data source can cover a whole node, or the node can shard it
/// per-endpoint; this crate only ever talks to it through paths.
#[async_trait]
pub trait AttributeDataSource: Send + Sync {
    /// Current data version for `path`'s `(endpoint, cluster)`, bumped
    /// by the data source itself whenever any attribute in that
    /// cluster changes. Used by the caller to skip unchanged clusters
    /// when a request carries a data-version filter.
    async fn data_version(&self, path: &AttributePath) -> Option<u32>;

    /// Read the current value at `path`. `Ok(None)` distinguishes "this
    /// attribute doesn't exist here" (surfaced upstream as
    /// `StatusCode::NOT_FOUND`) from an error reading it.
    async fn read(&self, path: &AttributePath) -> Result<Option<AttributeRead>, StatusCode>;

    /// Apply a write to `path`. The returned status is reported back to
    /// the client verbatim.
    async fn write(&self, path: &AttributePath, value: TlvElement) -> StatusCode;
}

/// Owns the event log for some set of endpoints/clusters.
#[async_trait]
pub trait EventDataSource: Send + Sync {
    /// Events at or after `since_number` matching `path`, in ascending
    /// event-number order. `path.event` of `0` with no further
    /// narrowing is the data source's own convention for "any event in
    /// this cluster" (this crate never looks at the value itself).
    async fn events_since(&self, path: &EventPath, since_event_number: u64) -> Vec<EventReportPayload>;
}
