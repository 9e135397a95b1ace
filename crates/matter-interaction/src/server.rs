//! Server-side Interaction Model dispatch: reads the first message on
//! an exchange and routes it to the handler's data sources, driving
//! the [`crate::chunker::Chunker`] for anything that replies with a
//! DataReport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use matter_exchange::{ExchangeCloseReason, ExchangeError, ExchangeManager, ProtocolHandler};
use matter_session::session::SessionType;
use matter_types::{ExchangeId, MessageType, ProtocolId, SessionId, StatusCode};
use matter_wire::datamodel::{
    AttributeReportPayload, CommandPath, EventPath, InvokeRequestPayload, InvokeResponsePayload,
    ReadRequestPayload, ReportItem, StatusResponsePayload, SubscribeRequestPayload,
    SubscribeResponsePayload, TimedRequestPayload, WriteRequestPayload, WriteResponsePayload,
};

use crate::chunker::Chunker;
use crate::client::DEFAULT_RESPONSE_TIMEOUT;
use crate::data_source::{AttributeDataSource, AttributeRead, EventDataSource};
use crate::{InteractionError, Result};

/// Tracks one still-live subscription so a future tick (driven by
/// whatever schedules periodic reports; out of scope here) knows what
/// paths it covers.
struct SubscriptionState {
    attribute_requests: Vec<matter_wire::datamodel::AttributePath>,
    event_requests: Vec<EventPath>,
}

/// Drives Read/Write/Subscribe/Invoke/Timed dispatch for one node,
/// against whatever [`AttributeDataSource`]/[`EventDataSource`] the
/// caller supplies.
pub struct InteractionServerHandler {
    attributes: Arc<dyn AttributeDataSource>,
    events: Arc<dyn EventDataSource>,
    max_payload_bytes: usize,
    next_subscription_id: AtomicU32,
    subscriptions: RwLock<HashMap<u32, SubscriptionState>>,
    /// Per-exchange waiter for the peer's `Status=Success` ack of a
    /// non-final `ReportData` chunk, so [`Self::send_chunks`] can pace
    /// itself against the peer the same way the client side's
    /// `collect_report` does.
    pending_acks: RwLock<HashMap<(SessionId, ExchangeId), mpsc::UnboundedSender<StatusResponsePayload>>>,
    chunk_ack_timeout: std::time::Duration,
}

impl InteractionServerHandler {
    pub fn new(attributes: Arc<dyn AttributeDataSource>, events: Arc<dyn EventDataSource>, max_payload_bytes: usize) -> Self {
        Self {
            attributes,
            events,
            max_payload_bytes,
            next_subscription_id: AtomicU32::new(1),
            subscriptions: RwLock::new(HashMap::new()),
            pending_acks: RwLock::new(HashMap::new()),
            chunk_ack_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Override how long [`Self::send_chunks`] waits for the peer's ack
    /// of a non-final chunk before giving up.
    pub fn with_chunk_ack_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.chunk_ack_timeout = timeout;
        self
    }

    async fn register_ack_waiter(&self, key: (SessionId, ExchangeId)) -> mpsc::UnboundedReceiver<StatusResponsePayload> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending_acks.write().await.insert(key, tx);
        rx
    }

    async fn unregister_ack_waiter(&self, key: (SessionId, ExchangeId)) {
        self.pending_acks.write().await.remove(&key);
    }

    /// Number of subscriptions currently tracked (for tests and demo
    /// instrumentation; there is no periodic re-report driver here).
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// The attribute/event paths a live subscription covers, if it
    /// exists.
    pub async fn subscribed_paths(
        &self,
        subscription_id: u32,
    ) -> Option<(Vec<matter_wire::datamodel::AttributePath>, Vec<EventPath>)> {
        self.subscriptions
            .read()
            .await
            .get(&subscription_id)
            .map(|s| (s.attribute_requests.clone(), s.event_requests.clone()))
    }

    async fn collect_attribute_reports(&self, paths: &[matter_wire::datamodel::AttributePath]) -> Vec<ReportItem> {
        let mut out = Vec::new();
        for path in paths {
            match self.attributes.read(path).await {
                Ok(Some(AttributeRead::Value(value))) => {
                    let data_version = self.attributes.data_version(path).await.unwrap_or(0);
                    out.push(ReportItem::Attribute(AttributeReportPayload::Value {
                        path: path.clone(),
                        data_version,
                        value,
                    }));
                }
                Ok(Some(AttributeRead::List(values))) => {
                    let data_version = self.attributes.data_version(path).await.unwrap_or(0);
                    // Replace-all marker (empty list) precedes the
                    // per-element chunk-append entries.
                    let mut list_path = path.clone();
                    list_path.list_index = None;
                    out.push(ReportItem::Attribute(AttributeReportPayload::Value {
                        path: list_path,
                        data_version,
                        value: matter_wire::tlv::TlvElement::List(Vec::new()),
                    }));
                    for (i, value) in values.into_iter().enumerate() {
                        let mut element_path = path.clone();
                        element_path.list_index = Some(i as u16);
                        out.push(ReportItem::Attribute(AttributeReportPayload::Value {
                            path: element_path,
                            data_version,
                            value,
                        }));
                    }
                }
                Ok(None) => out.push(ReportItem::Attribute(AttributeReportPayload::Status {
                    path: path.clone(),
                    status: StatusCode::NOT_FOUND,
                })),
                Err(status) => out.push(ReportItem::Attribute(AttributeReportPayload::Status {
                    path: path.clone(),
                    status,
                })),
            }
        }
        out
    }

    async fn collect_event_reports(&self, paths: &[EventPath]) -> Vec<ReportItem> {
        let mut out = Vec::new();
        for path in paths {
            for report in self.events.events_since(path, 0).await {
                out.push(ReportItem::Event(report));
            }
        }
        out
    }

    /// Send every chunk `chunker` produces as a `ReportData`, waiting
    /// for the peer's `Status=Success` ack between non-final chunks the
    /// same way the client side waits for this node's acks while
    /// reassembling a report (see `collect_report` in `client.rs`).
    /// The final chunk is sent without waiting for a reply.
    async fn send_chunks(
        &self,
        manager: &ExchangeManager,
        session_id: SessionId,
        exchange_id: ExchangeId,
        mut chunker: Chunker,
        subscription_id: Option<u32>,
    ) -> Result<()> {
        let key = (session_id, exchange_id);
        loop {
            let Some(mut chunk) = chunker.next_chunk(self.max_payload_bytes)? else {
                break;
            };
            chunk.subscription_id = subscription_id;
            let more = chunk.more_chunked_messages;

            if more {
                let mut rx = self.register_ack_waiter(key).await;
                manager
                    .send(session_id, exchange_id, MessageType::REPORT_DATA, chunk.encode(), true)
                    .await?;
                let ack = match tokio::time::timeout(self.chunk_ack_timeout, rx.recv()).await {
                    Ok(Some(ack)) => ack,
                    Ok(None) | Err(_) => {
                        self.unregister_ack_waiter(key).await;
                        return Err(InteractionError::Exchange(ExchangeError::NoResponseTimeout(exchange_id)));
                    }
                };
                self.unregister_ack_waiter(key).await;
                if !ack.status.is_success() {
                    return Err(InteractionError::StatusResponse(ack.status));
                }
            } else {
                manager
                    .send(session_id, exchange_id, MessageType::REPORT_DATA, chunk.encode(), true)
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_read(&self, manager: &ExchangeManager, session_id: SessionId, exchange_id: ExchangeId, payload: Vec<u8>) {
        let request = match ReadRequestPayload::decode(&payload) {
            Ok(r) => r,
            Err(error) => {
                tracing::warn!(%error, "malformed ReadRequest");
                self.reply_status(manager, session_id, exchange_id, StatusCode::FAILURE).await;
                return;
            }
        };

        let mut items = self.collect_attribute_reports(&request.attribute_requests).await;
        items.extend(self.collect_event_reports(&request.event_requests).await);

        let chunker = Chunker::new(items);
        if let Err(error) = self.send_chunks(manager, session_id, exchange_id, chunker, None).await {
            tracing::warn!(%error, "failed sending ReadRequest DataReport");
        }
    }

    async fn handle_write(&self, manager: &ExchangeManager, session_id: SessionId, exchange_id: ExchangeId, payload: Vec<u8>) {
        let request = match WriteRequestPayload::decode(&payload) {
            Ok(r) => r,
            Err(error) => {
                tracing::warn!(%error, "malformed WriteRequest");
                self.reply_status(manager, session_id, exchange_id, StatusCode::FAILURE).await;
                return;
            }
        };

        let mut results = Vec::with_capacity(request.writes.len());
        for (path, value) in &request.writes {
            let status = self.attributes.write(path, value.clone()).await;
            results.push(AttributeReportPayload::Status { path: path.clone(), status });
        }

        if request.suppress_response {
            return;
        }

        let response = WriteResponsePayload { results };
        if let Err(error) = manager
            .send(session_id, exchange_id, MessageType::WRITE_RESPONSE, response.encode(), true)
            .await
        {
            tracing::warn!(%error, "failed sending WriteResponse");
        }
    }

    async fn handle_subscribe(&self, manager: &ExchangeManager, session_id: SessionId, exchange_id: ExchangeId, payload: Vec<u8>) {
        let request = match SubscribeRequestPayload::decode(&payload) {
            Ok(r) => r,
            Err(error) => {
                tracing::warn!(%error, "malformed SubscribeRequest");
                self.reply_status(manager, session_id, exchange_id, StatusCode::FAILURE).await;
                return;
            }
        };

        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.write().await.insert(
            subscription_id,
            SubscriptionState {
                attribute_requests: request.attribute_requests.clone(),
                event_requests: request.event_requests.clone(),
            },
        );

        let mut items = self.collect_attribute_reports(&request.attribute_requests).await;
        items.extend(self.collect_event_reports(&request.event_requests).await);

        let chunker = Chunker::new(items);
        if let Err(error) = self
            .send_chunks(manager, session_id, exchange_id, chunker, Some(subscription_id))
            .await
        {
            tracing::warn!(%error, "failed sending initial subscription DataReport");
            return;
        }

        let response = SubscribeResponsePayload {
            subscription_id,
            max_interval_seconds: request.max_interval_ceiling_seconds,
        };
        if let Err(error) = manager
            .send(session_id, exchange_id, MessageType::SUBSCRIBE_RESPONSE, response.encode(), true)
            .await
        {
            tracing::warn!(%error, "failed sending SubscribeResponse");
        }
    }

    async fn handle_invoke(&self, manager: &ExchangeManager, session_id: SessionId, exchange_id: ExchangeId, payload: Vec<u8>) {
        let request = match InvokeRequestPayload::decode(&payload) {
            Ok(r) => r,
            Err(error) => {
                tracing::warn!(%error, "malformed InvokeRequest");
                self.reply_status(manager, session_id, exchange_id, StatusCode::FAILURE).await;
                return;
            }
        };

        // Invoking the command body itself belongs to the cluster
        // implementation; this messenger has no data source seam for
        // it (commands aren't attributes), so it reports InvalidCommand
        // for anything it's asked to invoke directly.
        let response = InvokeResponsePayload {
            path: request.path,
            status: StatusCode::INVALID_COMMAND,
            response: None,
        };
        if let Err(error) = manager
            .send(session_id, exchange_id, MessageType::INVOKE_RESPONSE, response.encode(), true)
            .await
        {
            tracing::warn!(%error, "failed sending InvokeResponse");
        }
    }

    async fn handle_timed(&self, manager: &ExchangeManager, session_id: SessionId, exchange_id: ExchangeId, payload: Vec<u8>) {
        if TimedRequestPayload::decode(&payload).is_err() {
            tracing::warn!("malformed TimedRequest");
        }
        self.reply_status(manager, session_id, exchange_id, StatusCode::SUCCESS).await;
    }

    /// Enforces spec §4.4's group-session action table: Read, Subscribe,
    /// and Timed requests are only valid on a unicast (or unsecured
    /// bootstrap) session. A group-addressed peer asking for one gets
    /// `Status=InvalidAction` and the exchange is closed rather than
    /// being served.
    async fn reject_if_group_session(
        &self,
        manager: &ExchangeManager,
        session_id: SessionId,
        exchange_id: ExchangeId,
    ) -> bool {
        if manager.session_type(session_id).await == Some(SessionType::Group) {
            self.reply_status(manager, session_id, exchange_id, StatusCode::INVALID_ACTION).await;
            manager
                .close_exchange_now(session_id, exchange_id, ExchangeCloseReason::Completed)
                .await;
            true
        } else {
            false
        }
    }

    async fn reply_status(&self, manager: &ExchangeManager, session_id: SessionId, exchange_id: ExchangeId, status: StatusCode) {
        let payload = StatusResponsePayload { status }.encode();
        if let Err(error) = manager
            .send(session_id, exchange_id, MessageType::STATUS_RESPONSE, payload, true)
            .await
        {
            tracing::warn!(%error, "failed sending StatusResponse");
        }
    }
}

#[async_trait]
impl ProtocolHandler for InteractionServerHandler {
    fn protocol_id(&self) -> ProtocolId {
        ProtocolId::INTERACTION_MODEL
    }

    async fn on_message(
        &self,
        manager: &ExchangeManager,
        session_id: SessionId,
        exchange_id: ExchangeId,
        message_type: MessageType,
        payload: Vec<u8>,
    ) {
        match message_type {
            MessageType::READ_REQUEST => {
                if self.reject_if_group_session(manager, session_id, exchange_id).await {
                    return;
                }
                self.handle_read(manager, session_id, exchange_id, payload).await
            }
            MessageType::WRITE_REQUEST => self.handle_write(manager, session_id, exchange_id, payload).await,
            MessageType::SUBSCRIBE_REQUEST => {
                if self.reject_if_group_session(manager, session_id, exchange_id).await {
                    return;
                }
                self.handle_subscribe(manager, session_id, exchange_id, payload).await
            }
            MessageType::INVOKE_REQUEST => self.handle_invoke(manager, session_id, exchange_id, payload).await,
            MessageType::TIMED_REQUEST => {
                if self.reject_if_group_session(manager, session_id, exchange_id).await {
                    return;
                }
                self.handle_timed(manager, session_id, exchange_id, payload).await
            }
            MessageType::STATUS_RESPONSE => {
                let key = (session_id, exchange_id);
                let waiter = self.pending_acks.read().await.get(&key).cloned();
                match waiter {
                    Some(tx) => match StatusResponsePayload::decode(&payload) {
                        Ok(status) => {
                            let _ = tx.send(status);
                        }
                        Err(error) => tracing::warn!(%error, ?exchange_id, "failed to decode chunk ack status response"),
                    },
                    None => tracing::trace!(?session_id, ?exchange_id, "peer status response received"),
                }
            }
            other => {
                tracing::warn!(?other, "unrecognized Interaction Model message type");
                self.reply_status(manager, session_id, exchange_id, StatusCode::INVALID_ACTION).await;
                manager
                    .close_exchange_now(session_id, exchange_id, ExchangeCloseReason::Completed)
                    .await;
            }
        }
    }

    async fn on_exchange_closed(&self, _session_id: SessionId, _exchange_id: ExchangeId, _reason: ExchangeCloseReason) {}
}
