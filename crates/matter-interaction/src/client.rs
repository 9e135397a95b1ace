//! Client-side Interaction Model messenger: emits Read/Write/Subscribe/
//! Invoke/TimedRequest and reassembles chunked `ReportData` replies into
//! a single [`DecodedDataReport`].
//!
//! Incoming traffic is demultiplexed by the exchange manager purely by
//! `protocol_id`, not by which side opened the exchange, so one
//! [`InteractionMessenger`] per node plays both roles: it routes replies
//! on exchanges this node's own client calls opened back to whichever
//! call is waiting on them, and falls through to an
//! [`InteractionServerHandler`](crate::server::InteractionServerHandler)
//! for everything else (a peer's own Read/Write/Subscribe/Invoke against
//! this node).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use matter_exchange::{ExchangeCloseReason, ExchangeError, ExchangeManager, ProtocolHandler};
use matter_queue::InteractionQueue;
use matter_types::{ExchangeId, MessageType, ProtocolId, SessionId, StatusCode};
use matter_wire::datamodel::{
    AttributeReportPayload, EventReportPayload, InvokeRequestPayload, InvokeResponsePayload,
    ReadRequestPayload, StatusResponsePayload, SubscribeRequestPayload, SubscribeResponsePayload,
    TimedRequestPayload, WriteRequestPayload, WriteResponsePayload,
};

use crate::chunker::ReportDataChunk;
use crate::server::InteractionServerHandler;
use crate::{InteractionError, Result};

/// How long a single outstanding request/response leg is allowed to
/// take before the call surfaces a timeout, per §5's "every
/// `next_message` call takes an expected processing time +
/// retransmission budget."
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// One inbound message routed to whichever client call opened the
/// exchange it arrived on.
#[derive(Debug)]
enum ClientInbound {
    ReportData(ReportDataChunk),
    WriteResponse(WriteResponsePayload),
    SubscribeResponse(SubscribeResponsePayload),
    InvokeResponse(InvokeResponsePayload),
    Status(StatusResponsePayload),
    ExchangeClosed(ExchangeCloseReason),
}

/// The fully reassembled result of a Read or Subscribe's report: every
/// attribute/event report across however many `ReportData` chunks it
/// took to deliver, in wire order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedDataReport {
    pub attribute_reports: Vec<AttributeReportPayload>,
    pub event_reports: Vec<EventReportPayload>,
}

/// Routes inbound Interaction Model traffic for one node: replies to
/// exchanges this node's client opened go to whichever call is waiting;
/// everything else falls through to `server`, if one is registered
/// (nodes that are purely clients, e.g. a controller, run with `server:
/// None`).
pub struct InteractionMessenger {
    server: Option<Arc<InteractionServerHandler>>,
    pending: Mutex<HashMap<(SessionId, ExchangeId), mpsc::UnboundedSender<ClientInbound>>>,
}

impl InteractionMessenger {
    pub fn new(server: Option<Arc<InteractionServerHandler>>) -> Arc<Self> {
        Arc::new(Self {
            server,
            pending: Mutex::new(HashMap::new()),
        })
    }

    async fn register(&self, key: (SessionId, ExchangeId)) -> mpsc::UnboundedReceiver<ClientInbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().await.insert(key, tx);
        rx
    }

    async fn unregister(&self, key: (SessionId, ExchangeId)) {
        self.pending.lock().await.remove(&key);
    }
}

#[async_trait]
impl ProtocolHandler for InteractionMessenger {
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
        let key = (session_id, exchange_id);
        let sender = self.pending.lock().await.get(&key).cloned();
        if let Some(tx) = sender {
            let decoded = match message_type {
                MessageType::REPORT_DATA => ReportDataChunk::decode(&payload).ok().map(ClientInbound::ReportData),
                MessageType::WRITE_RESPONSE => WriteResponsePayload::decode(&payload).ok().map(ClientInbound::WriteResponse),
                MessageType::SUBSCRIBE_RESPONSE => {
                    SubscribeResponsePayload::decode(&payload).ok().map(ClientInbound::SubscribeResponse)
                }
                MessageType::INVOKE_RESPONSE => InvokeResponsePayload::decode(&payload).ok().map(ClientInbound::InvokeResponse),
                MessageType::STATUS_RESPONSE => StatusResponsePayload::decode(&payload).ok().map(ClientInbound::Status),
                other => {
                    tracing::warn!(?other, ?exchange_id, "unexpected message type on a client-owned exchange");
                    None
                }
            };
            match decoded {
                Some(message) => {
                    let _ = tx.send(message);
                }
                None => tracing::warn!(?exchange_id, ?message_type, "failed to decode reply on client-owned exchange"),
            }
            return;
        }

        match &self.server {
            Some(server) => {
                server
                    .on_message(manager, session_id, exchange_id, message_type, payload)
                    .await
            }
            None => {
                tracing::warn!(
                    ?session_id,
                    ?exchange_id,
                    ?message_type,
                    "no server handler registered for unsolicited Interaction Model message"
                );
            }
        }
    }

    async fn on_exchange_closed(&self, session_id: SessionId, exchange_id: ExchangeId, reason: ExchangeCloseReason) {
        let key = (session_id, exchange_id);
        if let Some(tx) = self.pending.lock().await.get(&key).cloned() {
            let _ = tx.send(ClientInbound::ExchangeClosed(reason));
        }
        if let Some(server) = &self.server {
            server.on_exchange_closed(session_id, exchange_id, reason).await;
        }
    }
}

/// Emits Read/Write/Subscribe/Invoke/Timed requests against one peer
/// session and reassembles chunked `ReportData` replies.
///
/// Every call is serialized through a per-peer [`InteractionQueue`]
/// (capacity 1 by default, per §4.6: "a FIFO coordination primitive
/// that serializes client-initiated interactions against a peer"):
/// a second `read`/`write`/`subscribe`/`invoke` issued while one is
/// still in flight queues behind it in arrival order instead of
/// racing it on the same peer.
pub struct InteractionClientMessenger {
    manager: Arc<ExchangeManager>,
    messenger: Arc<InteractionMessenger>,
    max_payload_bytes: usize,
    response_timeout: Duration,
    queue: Arc<InteractionQueue>,
}

impl InteractionClientMessenger {
    pub fn new(manager: Arc<ExchangeManager>, messenger: Arc<InteractionMessenger>, max_payload_bytes: usize) -> Self {
        Self {
            manager,
            messenger,
            max_payload_bytes,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            queue: InteractionQueue::new(1),
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Allow more than one client-initiated interaction against this
    /// peer in flight at once. Most callers leave this at the default
    /// of 1 (spec.md §4.6: "capacity N, typically 1 per peer").
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue = InteractionQueue::new(capacity);
        self
    }

    /// The underlying per-peer slot queue, for callers that want to
    /// observe `running`/`waiting` or drive their own cancellation
    /// (e.g. closing a node aborts every queued interaction).
    pub fn queue(&self) -> Arc<InteractionQueue> {
        self.queue.clone()
    }

    async fn open(&self, session_id: SessionId) -> Result<(ExchangeId, mpsc::UnboundedReceiver<ClientInbound>)> {
        let exchange_id = self.manager.initiate_exchange(session_id, ProtocolId::INTERACTION_MODEL).await?;
        let rx = self.messenger.register((session_id, exchange_id)).await;
        Ok((exchange_id, rx))
    }

    async fn close(&self, session_id: SessionId, exchange_id: ExchangeId) {
        self.messenger.unregister((session_id, exchange_id)).await;
    }

    async fn recv_one(&self, exchange_id: ExchangeId, rx: &mut mpsc::UnboundedReceiver<ClientInbound>) -> Result<ClientInbound> {
        match tokio::time::timeout(self.response_timeout, rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) | Err(_) => Err(InteractionError::Exchange(ExchangeError::NoResponseTimeout(exchange_id))),
        }
    }

    /// Issue a `ReadRequest`, returning the fully reassembled report once
    /// every chunk has arrived. Shortens `data_version_filters` from the
    /// tail, in first-to-last-dropped order, until the encoded request
    /// fits the transport's budget.
    pub async fn read(&self, session_id: SessionId, mut request: ReadRequestPayload) -> Result<DecodedDataReport> {
        let _slot = self.queue.obtain_slot(CancellationToken::new()).await?;
        request.shorten_data_version_filters_to_fit(self.max_payload_bytes);
        let (exchange_id, mut rx) = self.open(session_id).await?;

        if let Err(error) = self
            .manager
            .send(session_id, exchange_id, MessageType::READ_REQUEST, request.encode(), true)
            .await
        {
            self.close(session_id, exchange_id).await;
            return Err(error.into());
        }

        let result = self.collect_report(session_id, exchange_id, &mut rx).await;
        self.close(session_id, exchange_id).await;
        result
    }

    /// Issue a `WriteRequest`. Returns immediately once sent when
    /// `suppress_response` is set; otherwise waits for the
    /// `WriteResponse`.
    pub async fn write(&self, session_id: SessionId, request: WriteRequestPayload) -> Result<Option<WriteResponsePayload>> {
        let _slot = self.queue.obtain_slot(CancellationToken::new()).await?;
        let suppress_response = request.suppress_response;
        let (exchange_id, mut rx) = self.open(session_id).await?;

        if let Err(error) = self
            .manager
            .send(session_id, exchange_id, MessageType::WRITE_REQUEST, request.encode(), true)
            .await
        {
            self.close(session_id, exchange_id).await;
            return Err(error.into());
        }

        if suppress_response {
            self.close(session_id, exchange_id).await;
            return Ok(None);
        }

        let result = loop {
            match self.recv_one(exchange_id, &mut rx).await {
                Ok(ClientInbound::WriteResponse(response)) => break Ok(Some(response)),
                Ok(ClientInbound::Status(status)) => break Err(InteractionError::StatusResponse(status.status)),
                Ok(ClientInbound::ExchangeClosed(reason)) => break Err(InteractionError::ExchangeClosed(reason)),
                Ok(_) => continue,
                Err(error) => break Err(error),
            }
        };
        self.close(session_id, exchange_id).await;
        result
    }

    /// Issue a `SubscribeRequest`: reassembles the initial report the
    /// same way [`InteractionClientMessenger::read`] does, then waits
    /// for the trailing `SubscribeResponse`.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
        request: SubscribeRequestPayload,
    ) -> Result<(DecodedDataReport, SubscribeResponsePayload)> {
        let _slot = self.queue.obtain_slot(CancellationToken::new()).await?;
        let (exchange_id, mut rx) = self.open(session_id).await?;

        if let Err(error) = self
            .manager
            .send(session_id, exchange_id, MessageType::SUBSCRIBE_REQUEST, request.encode(), true)
            .await
        {
            self.close(session_id, exchange_id).await;
            return Err(error.into());
        }

        let report = match self.collect_report(session_id, exchange_id, &mut rx).await {
            Ok(report) => report,
            Err(error) => {
                self.close(session_id, exchange_id).await;
                return Err(error);
            }
        };

        let result = loop {
            match self.recv_one(exchange_id, &mut rx).await {
                Ok(ClientInbound::SubscribeResponse(response)) => break Ok((report.clone(), response)),
                Ok(ClientInbound::ExchangeClosed(reason)) => break Err(InteractionError::ExchangeClosed(reason)),
                Ok(_) => continue,
                Err(error) => break Err(error),
            }
        };
        self.close(session_id, exchange_id).await;
        result
    }

    /// Issue an `InvokeRequest` and wait for its `InvokeResponse`.
    pub async fn invoke(&self, session_id: SessionId, request: InvokeRequestPayload) -> Result<InvokeResponsePayload> {
        let _slot = self.queue.obtain_slot(CancellationToken::new()).await?;
        let (exchange_id, mut rx) = self.open(session_id).await?;

        if let Err(error) = self
            .manager
            .send(session_id, exchange_id, MessageType::INVOKE_REQUEST, request.encode(), true)
            .await
        {
            self.close(session_id, exchange_id).await;
            return Err(error.into());
        }

        let result = loop {
            match self.recv_one(exchange_id, &mut rx).await {
                Ok(ClientInbound::InvokeResponse(response)) => break Ok(response),
                Ok(ClientInbound::Status(status)) => break Err(InteractionError::StatusResponse(status.status)),
                Ok(ClientInbound::ExchangeClosed(reason)) => break Err(InteractionError::ExchangeClosed(reason)),
                Ok(_) => continue,
                Err(error) => break Err(error),
            }
        };
        self.close(session_id, exchange_id).await;
        result
    }

    /// Record a deadline with the peer, then send `request` on the same
    /// exchange. Per §4.4's Timed row: the peer replies `Status=Success`
    /// to the `TimedRequest` itself before the real write is allowed.
    pub async fn timed_write(
        &self,
        session_id: SessionId,
        timeout_ms: u16,
        mut request: WriteRequestPayload,
    ) -> Result<Option<WriteResponsePayload>> {
        let _slot = self.queue.obtain_slot(CancellationToken::new()).await?;
        request.timed_request = true;
        let suppress_response = request.suppress_response;
        let (exchange_id, mut rx) = self.open(session_id).await?;
        let result = async {
            self.send_timed_request(session_id, exchange_id, timeout_ms, &mut rx).await?;
            self.manager
                .send(session_id, exchange_id, MessageType::WRITE_REQUEST, request.encode(), true)
                .await?;
            if suppress_response {
                return Ok(None);
            }
            loop {
                match self.recv_one(exchange_id, &mut rx).await? {
                    ClientInbound::WriteResponse(response) => return Ok(Some(response)),
                    ClientInbound::Status(status) => return Err(InteractionError::StatusResponse(status.status)),
                    ClientInbound::ExchangeClosed(reason) => return Err(InteractionError::ExchangeClosed(reason)),
                    _ => continue,
                }
            }
        }
        .await;
        self.close(session_id, exchange_id).await;
        result
    }

    /// Record a deadline with the peer, then invoke `request` on the
    /// same exchange.
    pub async fn timed_invoke(
        &self,
        session_id: SessionId,
        timeout_ms: u16,
        mut request: InvokeRequestPayload,
    ) -> Result<InvokeResponsePayload> {
        let _slot = self.queue.obtain_slot(CancellationToken::new()).await?;
        request.timed_request = true;
        let (exchange_id, mut rx) = self.open(session_id).await?;
        let result = async {
            self.send_timed_request(session_id, exchange_id, timeout_ms, &mut rx).await?;
            self.manager
                .send(session_id, exchange_id, MessageType::INVOKE_REQUEST, request.encode(), true)
                .await?;
            loop {
                match self.recv_one(exchange_id, &mut rx).await? {
                    ClientInbound::InvokeResponse(response) => return Ok(response),
                    ClientInbound::Status(status) => return Err(InteractionError::StatusResponse(status.status)),
                    ClientInbound::ExchangeClosed(reason) => return Err(InteractionError::ExchangeClosed(reason)),
                    _ => continue,
                }
            }
        }
        .await;
        self.close(session_id, exchange_id).await;
        result
    }

    async fn send_timed_request(
        &self,
        session_id: SessionId,
        exchange_id: ExchangeId,
        timeout_ms: u16,
        rx: &mut mpsc::UnboundedReceiver<ClientInbound>,
    ) -> Result<()> {
        self.manager
            .send(
                session_id,
                exchange_id,
                MessageType::TIMED_REQUEST,
                TimedRequestPayload { timeout_ms }.encode(),
                true,
            )
            .await?;

        match self.recv_one(exchange_id, rx).await? {
            ClientInbound::Status(status) if status.status.is_success() => Ok(()),
            ClientInbound::Status(status) => Err(InteractionError::StatusResponse(status.status)),
            ClientInbound::ExchangeClosed(reason) => Err(InteractionError::ExchangeClosed(reason)),
            _ => Err(InteractionError::UnexpectedMessage),
        }
    }

    /// Drain `ReportData` chunks until the terminal one, acking each
    /// intermediate chunk with `Status=Success` synchronously before
    /// reading the next (the multi-message-interaction ack), and the
    /// terminal one fire-and-forget.
    async fn collect_report(
        &self,
        session_id: SessionId,
        exchange_id: ExchangeId,
        rx: &mut mpsc::UnboundedReceiver<ClientInbound>,
    ) -> Result<DecodedDataReport> {
        let mut report = DecodedDataReport::default();
        loop {
            match self.recv_one(exchange_id, rx).await? {
                ClientInbound::ReportData(chunk) => {
                    let more = chunk.more_chunked_messages;
                    report.attribute_reports.extend(chunk.attribute_reports);
                    report.event_reports.extend(chunk.event_reports);

                    let ack = StatusResponsePayload { status: StatusCode::SUCCESS }.encode();
                    if more {
                        self.manager
                            .send(session_id, exchange_id, MessageType::STATUS_RESPONSE, ack, true)
                            .await?;
                    } else {
                        let _ = self
                            .manager
                            .send(session_id, exchange_id, MessageType::STATUS_RESPONSE, ack, false)
                            .await;
                        return Ok(report);
                    }
                }
                ClientInbound::Status(status) if !status.status.is_success() => {
                    return Err(InteractionError::StatusResponse(status.status));
                }
                ClientInbound::ExchangeClosed(reason) => return Err(InteractionError::ExchangeClosed(reason)),
                _ => continue,
            }
        }
    }
}
