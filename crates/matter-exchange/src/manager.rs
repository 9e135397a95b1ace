//! The Exchange Manager: the single entry point that owns the
//! exchange table, dispatches incoming datagrams, and drives MRP
//! retransmission.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use matter_crypto::aead;
use matter_session::session::SessionType;
use matter_session::SessionManager;
use matter_transport::Transport;
use matter_types::{
    ExchangeId, MessageType, NodeId, ProtocolId, Role, SessionId, MAX_CONCURRENT_EXCHANGES_PER_SESSION,
};
use matter_wire::message::{Destination, Message, PacketHeader, PacketHeaderFlags, PayloadHeader, PayloadHeaderFlags};

use crate::exchange::{Exchange, ExchangeState};
use crate::handler::{ExchangeCloseReason, ProtocolHandler};
use crate::mrp::{RetransmissionTracker, RetransmitOutcome};
use crate::{ExchangeError, Result};

type ExchangeKey = (SessionId, ExchangeId);

/// Owns every exchange this node currently has open, the registered
/// protocol handlers, and the MRP retransmission timer.
pub struct ExchangeManager {
    local_node_id: NodeId,
    transport: Arc<dyn Transport>,
    sessions: Arc<SessionManager>,
    exchanges: RwLock<HashMap<ExchangeKey, Arc<Mutex<Exchange>>>>,
    exchange_order: RwLock<Vec<ExchangeKey>>,
    handlers: RwLock<HashMap<ProtocolId, Arc<dyn ProtocolHandler>>>,
    retransmissions: Mutex<RetransmissionTracker>,
    peer_addrs: RwLock<HashMap<SessionId, SocketAddr>>,
    next_exchange_id: AtomicU16,
    cancellation: CancellationToken,
}

impl ExchangeManager {
    pub fn new(local_node_id: NodeId, transport: Arc<dyn Transport>, sessions: Arc<SessionManager>) -> Arc<Self> {
        Arc::new(Self {
            local_node_id,
            transport,
            sessions,
            exchanges: RwLock::new(HashMap::new()),
            exchange_order: RwLock::new(Vec::new()),
            handlers: RwLock::new(HashMap::new()),
            retransmissions: Mutex::new(RetransmissionTracker::new()),
            peer_addrs: RwLock::new(HashMap::new()),
            next_exchange_id: AtomicU16::new(1),
            cancellation: CancellationToken::new(),
        })
    }

    /// Register a handler for `handler.protocol_id()`. Registering a
    /// second handler for the same protocol replaces the first.
    pub async fn add_protocol_handler(&self, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.write().await.insert(handler.protocol_id(), handler);
    }

    /// Remember which transport address a session's peer is reachable
    /// at, so later sends on that session don't need the caller to
    /// repeat it.
    pub async fn set_peer_addr(&self, session_id: SessionId, addr: SocketAddr) {
        self.peer_addrs.write().await.insert(session_id, addr);
    }

    /// The session type a message arrived on, for handlers that must
    /// enforce spec §4.4's group-session action table (e.g. rejecting a
    /// `ReadRequest` received over a group session). Returns `None` if
    /// the session has since been torn down.
    pub async fn session_type(&self, session_id: SessionId) -> Option<SessionType> {
        let session = self.sessions.get(session_id).await.ok()?;
        let session = session.lock().await;
        Some(session.session_type)
    }

    fn allocate_exchange_id(&self) -> ExchangeId {
        loop {
            let id = self.next_exchange_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return ExchangeId(id);
            }
        }
    }

    /// Open a new exchange as the initiator, for `protocol_id` over
    /// `session_id`. Evicts the oldest open exchange on this session if
    /// it is already at the concurrent-exchange limit, matching the
    /// core's bias toward making progress on new requests over an
    /// indefinitely stalled one.
    pub async fn initiate_exchange(self: &Arc<Self>, session_id: SessionId, protocol_id: ProtocolId) -> Result<ExchangeId> {
        self.evict_oldest_if_full(session_id).await;

        let exchange_id = self.allocate_exchange_id();
        let exchange = Exchange::new(exchange_id, session_id, protocol_id, Role::Initiator);
        self.exchanges
            .write()
            .await
            .insert((session_id, exchange_id), Arc::new(Mutex::new(exchange)));
        self.exchange_order.write().await.push((session_id, exchange_id));
        Ok(exchange_id)
    }

    async fn evict_oldest_if_full(&self, session_id: SessionId) {
        let count = self
            .exchanges
            .read()
            .await
            .keys()
            .filter(|(sid, _)| *sid == session_id)
            .count();
        if count < MAX_CONCURRENT_EXCHANGES_PER_SESSION {
            return;
        }

        let mut order = self.exchange_order.write().await;
        if let Some(pos) = order.iter().position(|(sid, _)| *sid == session_id) {
            let evicted = order.remove(pos);
            drop(order);
            // Forced: the whole point of evicting is to free the slot
            // immediately for the new exchange, so this can't defer on
            // a pending ack the way a normal close does.
            self.close_exchange_forced(evicted, ExchangeCloseReason::ManagerShutdown).await;
            tracing::warn!(?evicted, "evicted oldest exchange to admit a new one");
        }
    }

    /// Close `exchange_id`, notifying its handler with `reason`. For use
    /// by a protocol handler that has decided the conversation is over
    /// (e.g. an unrecognized message type under 4.4's "other" rule). If
    /// the exchange still owes its peer an acknowledgement, the table
    /// entry is kept until that ack actually goes out over `send`.
    pub async fn close_exchange_now(&self, session_id: SessionId, exchange_id: ExchangeId, reason: ExchangeCloseReason) {
        self.close_exchange((session_id, exchange_id), reason).await;
    }

    async fn close_exchange(&self, key: ExchangeKey, reason: ExchangeCloseReason) {
        let Some(exchange) = self.exchanges.read().await.get(&key).cloned() else {
            return;
        };
        let finalize_now = exchange.lock().await.begin_close(reason);
        if finalize_now {
            self.finalize_close(key, &exchange, reason).await;
        }
    }

    /// Close `exchange_id` immediately regardless of any acknowledgement
    /// still owed, for cases where waiting for it no longer makes sense
    /// (eviction, retransmission exhaustion, manager shutdown).
    async fn close_exchange_forced(&self, key: ExchangeKey, reason: ExchangeCloseReason) {
        let Some(exchange) = self.exchanges.read().await.get(&key).cloned() else {
            return;
        };
        exchange.lock().await.force_close();
        self.finalize_close(key, &exchange, reason).await;
    }

    async fn finalize_close(&self, key: ExchangeKey, exchange: &Arc<Mutex<Exchange>>, reason: ExchangeCloseReason) {
        self.exchanges.write().await.remove(&key);
        self.exchange_order.write().await.retain(|k| *k != key);
        let (protocol_id, exchange_id, session_id) = {
            let e = exchange.lock().await;
            (e.protocol_id, e.exchange_id, e.session_id)
        };
        if let Some(handler) = self.handlers.read().await.get(&protocol_id).cloned() {
            handler.on_exchange_closed(session_id, exchange_id, reason).await;
        }
    }

    /// Handle a raw datagram received from `source`. Decodes the
    /// packet, resolves or admits the session and exchange, processes
    /// any MRP acknowledgement/ack-owed bookkeeping, and dispatches the
    /// application payload to the registered protocol handler.
    pub async fn on_datagram(self: &Arc<Self>, raw: &[u8], source: SocketAddr) -> Result<()> {
        let (packet_header, consumed) = PacketHeader::decode(raw)?;
        let rest = &raw[consumed..];

        let (message, is_duplicate) = match packet_header.destination {
            Some(Destination::Group(group_id)) => {
                let source_node_id = packet_header
                    .source_node_id
                    .ok_or(ExchangeError::MissingSourceNodeId)?;
                let nonce = aead::build_nonce(0, packet_header.message_counter, source_node_id.value());
                let (plaintext, is_duplicate) = self
                    .sessions
                    .decode_group_packet(
                        group_id,
                        source_node_id,
                        packet_header.message_counter,
                        &raw[..consumed],
                        rest,
                        &nonce,
                    )
                    .await?;
                (Message::from_secure_parts(packet_header.clone(), &plaintext)?, is_duplicate)
            }
            _ if packet_header.session_id.value() == 0 => {
                let initiator_node_id = packet_header.source_node_id.unwrap_or(NodeId(0));
                let session = self.sessions.unsecured_session(initiator_node_id).await;
                let is_duplicate = session
                    .lock()
                    .await
                    .accept_incoming_counter(packet_header.message_counter)
                    .is_err();
                (Message::decode_unsecured(raw)?, is_duplicate)
            }
            _ => {
                let session = self.sessions.get(packet_header.session_id).await?;
                let mut session = session.lock().await;
                let is_duplicate = session
                    .accept_incoming_counter(packet_header.message_counter)
                    .is_err();
                let nonce = aead::build_nonce(
                    0,
                    packet_header.message_counter,
                    packet_header.source_node_id.map(|n| n.value()).unwrap_or(0),
                );
                let decrypt_key: [u8; aead::KEY_SIZE] = session.decrypt_key().try_into().expect("32-byte key");
                let plaintext = aead::decrypt(&decrypt_key, &nonce, rest, &raw[..consumed])?;
                (Message::from_secure_parts(packet_header.clone(), &plaintext)?, is_duplicate)
            }
        };

        self.peer_addrs.write().await.insert(packet_header.session_id, source);

        let key = (packet_header.session_id, message.payload_header.exchange_id);

        if message.payload_header.flags.acknowledgement {
            if let Some(counter) = message.payload_header.acknowledged_counter {
                self.retransmissions.lock().await.acknowledge(counter);
            }
        }

        let exchange = {
            let existing = self.exchanges.read().await.get(&key).cloned();
            match existing {
                Some(e) => e,
                None => {
                    self.evict_oldest_if_full(packet_header.session_id).await;
                    let role = Role::complementary(message.payload_header.flags.initiator);
                    let exchange = Arc::new(Mutex::new(Exchange::new(
                        message.payload_header.exchange_id,
                        packet_header.session_id,
                        message.payload_header.protocol_id,
                        role,
                    )));
                    self.exchanges.write().await.insert(key, exchange.clone());
                    self.exchange_order.write().await.push(key);
                    exchange
                }
            }
        };

        if message.payload_header.flags.requires_ack {
            exchange.lock().await.set_pending_ack(packet_header.message_counter);
        }

        if message.payload_header.message_type == MessageType::STANDALONE_ACK {
            return Ok(());
        }

        if is_duplicate {
            tracing::trace!(
                session_id = ?packet_header.session_id,
                counter = packet_header.message_counter,
                "duplicate message counter, acknowledging without redelivering to the handler"
            );
            return Ok(());
        }

        let handler = self
            .handlers
            .read()
            .await
            .get(&message.payload_header.protocol_id)
            .cloned();

        match handler {
            Some(handler) => {
                handler
                    .on_message(
                        self,
                        packet_header.session_id,
                        message.payload_header.exchange_id,
                        message.payload_header.message_type,
                        message.application_payload,
                    )
                    .await;
                Ok(())
            }
            None => Err(ExchangeError::UnhandledProtocol(message.payload_header.protocol_id)),
        }
    }

    /// Send `payload` as `message_type` on `exchange_id`. Piggybacks an
    /// acknowledgement for any message this exchange still owes one
    /// for, and tracks the send for retransmission when `requires_ack`
    /// is set.
    pub async fn send(
        &self,
        session_id: SessionId,
        exchange_id: ExchangeId,
        message_type: MessageType,
        payload: Vec<u8>,
        requires_ack: bool,
    ) -> Result<()> {
        let key = (session_id, exchange_id);
        let exchange = self
            .exchanges
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(ExchangeError::ChannelNotConnected(exchange_id))?;

        let dest = self
            .peer_addrs
            .read()
            .await
            .get(&session_id)
            .copied()
            .ok_or(ExchangeError::ChannelNotConnected(exchange_id))?;

        let session = self.sessions.get(session_id).await?;
        let mut session = session.lock().await;

        let (role, acknowledged_counter) = {
            let exchange = exchange.lock().await;
            (exchange.role, exchange.owes_ack())
        };

        let counter = session.next_outgoing_counter();
        let packet_header = PacketHeader {
            flags: PacketHeaderFlags {
                has_source_node_id: true,
            },
            session_id: session.peer_session_id,
            message_counter: counter,
            source_node_id: Some(self.local_node_id),
            destination: Some(Destination::Node(session.peer_node_id)),
        };
        let payload_header = PayloadHeader {
            exchange_id,
            protocol_id: exchange.lock().await.protocol_id,
            message_type,
            flags: PayloadHeaderFlags {
                initiator: role == Role::Initiator,
                acknowledgement: acknowledged_counter.is_some(),
                requires_ack,
                reliable: requires_ack,
            },
            acknowledged_counter,
        };
        let message = Message {
            packet_header,
            payload_header,
            application_payload: payload,
        };

        let (aad, plaintext) = message.split_for_secure();
        let nonce = aead::build_nonce(0, counter, self.local_node_id.value());
        let encrypt_key: [u8; aead::KEY_SIZE] = session.encrypt_key().try_into().expect("32-byte key");
        let ciphertext = aead::encrypt(&encrypt_key, &nonce, &plaintext, &aad)?;
        let mut wire = aad;
        wire.extend_from_slice(&ciphertext);

        self.transport.send_to(dest, &wire).await?;

        if acknowledged_counter.is_some() {
            let deferred_reason = exchange.lock().await.ack_sent();
            if let Some(reason) = deferred_reason {
                self.finalize_close(key, &exchange, reason).await;
            }
        }

        if requires_ack {
            self.retransmissions
                .lock()
                .await
                .track(counter, wire, dest, session_id, exchange_id, session.parameters, Instant::now());
        }

        Ok(())
    }

    /// Send a zero-payload standalone acknowledgement for `exchange_id`
    /// if it currently owes one. Callers (typically a background timer)
    /// invoke this when an exchange has gone a while without a data
    /// message to piggyback the ack on.
    pub async fn send_standalone_ack_if_owed(&self, session_id: SessionId, exchange_id: ExchangeId) -> Result<()> {
        let key = (session_id, exchange_id);
        let exchange = self.exchanges.read().await.get(&key).cloned();
        let owes = match exchange {
            Some(exchange) => exchange.lock().await.owes_ack(),
            None => None,
        };
        if owes.is_some() {
            self.send(session_id, exchange_id, MessageType::STANDALONE_ACK, Vec::new(), false)
                .await?;
        }
        Ok(())
    }

    /// Run the MRP retransmission loop until [`ExchangeManager::shutdown`]
    /// is called. Intended to run as a background task spawned once per
    /// manager instance.
    pub async fn run_retransmit_loop(self: Arc<Self>) {
        loop {
            let sleep_for = {
                let tracker = self.retransmissions.lock().await;
                match tracker.next_deadline() {
                    Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                    None => Duration::from_millis(50),
                }
            };

            tokio::select! {
                _ = self.cancellation.cancelled() => return,
                _ = tokio::time::sleep(sleep_for) => {}
            }

            let outcomes = self.retransmissions.lock().await.sweep_due(Instant::now());
            for (_, outcome) in outcomes {
                match outcome {
                    RetransmitOutcome::Resend {
                        payload,
                        dest,
                        session_id,
                        exchange_id,
                        attempt,
                    } => {
                        self.sessions.notify_retry(session_id, exchange_id, attempt);
                        if let Err(error) = self.transport.send_to(dest, &payload).await {
                            tracing::warn!(%error, "retransmit send failed");
                        }
                    }
                    RetransmitOutcome::GiveUp { session_id, exchange_id } => {
                        tracing::warn!(?session_id, ?exchange_id, "retransmission limit reached");
                        self.close_exchange_forced((session_id, exchange_id), ExchangeCloseReason::RetransmissionLimitReached)
                            .await;
                    }
                }
            }
        }
    }

    /// Signal the retransmit loop to stop and drop every open exchange,
    /// notifying handlers with [`ExchangeCloseReason::ManagerShutdown`].
    pub async fn shutdown(&self) {
        self.cancellation.cancel();
        let keys: Vec<ExchangeKey> = self.exchanges.read().await.keys().copied().collect();
        for key in keys {
            self.close_exchange_forced(key, ExchangeCloseReason::ManagerShutdown).await;
        }
    }

    pub async fn open_exchange_count(&self) -> usize {
        self.exchanges.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matter_crypto::aead::KEY_SIZE;
    use matter_crypto::kdf::SessionKeys;
    use matter_session::session::SessionType;
    use matter_transport::udp::{UdpConfig, UdpTransport};
    use matter_types::FabricIndex;

    fn test_keys() -> SessionKeys {
        SessionKeys {
            encrypt_key: [3u8; KEY_SIZE],
            decrypt_key: [4u8; KEY_SIZE],
        }
    }

    async fn manager_with_udp() -> Arc<ExchangeManager> {
        let transport = Arc::new(UdpTransport::bind(UdpConfig::default()).await.expect("bind"));
        let sessions = Arc::new(SessionManager::new());
        ExchangeManager::new(NodeId(1), transport, sessions)
    }

    #[tokio::test]
    async fn initiate_exchange_allocates_unique_ids() {
        let manager = manager_with_udp().await;
        let a = manager.initiate_exchange(SessionId(1), ProtocolId::INTERACTION_MODEL).await.unwrap();
        let b = manager.initiate_exchange(SessionId(1), ProtocolId::INTERACTION_MODEL).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(manager.open_exchange_count().await, 2);
    }

    #[tokio::test]
    async fn evicts_oldest_exchange_when_session_is_full() {
        let manager = manager_with_udp().await;
        let mut first = None;
        for i in 0..MAX_CONCURRENT_EXCHANGES_PER_SESSION {
            let id = manager.initiate_exchange(SessionId(1), ProtocolId::INTERACTION_MODEL).await.unwrap();
            if i == 0 {
                first = Some(id);
            }
        }
        assert_eq!(manager.open_exchange_count().await, MAX_CONCURRENT_EXCHANGES_PER_SESSION);

        manager.initiate_exchange(SessionId(1), ProtocolId::INTERACTION_MODEL).await.unwrap();
        assert_eq!(manager.open_exchange_count().await, MAX_CONCURRENT_EXCHANGES_PER_SESSION);
        assert!(!manager.exchanges.read().await.contains_key(&(SessionId(1), first.unwrap())));
    }

    #[tokio::test]
    async fn shutdown_clears_exchanges() {
        let manager = manager_with_udp().await;
        manager.initiate_exchange(SessionId(1), ProtocolId::INTERACTION_MODEL).await.unwrap();
        manager.shutdown().await;
        assert_eq!(manager.open_exchange_count().await, 0);
    }

    #[allow(dead_code)]
    async fn establish_test_session(sessions: &SessionManager) -> SessionId {
        sessions
            .insert(
                SessionId(1),
                SessionType::Unicast,
                NodeId(2),
                Role::Initiator,
                test_keys(),
                FabricIndex(1),
                0,
            )
            .await
    }

    struct CountingHandler {
        protocol_id: ProtocolId,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl CountingHandler {
        fn new(protocol_id: ProtocolId) -> Arc<Self> {
            Arc::new(Self {
                protocol_id,
                calls: std::sync::atomic::AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait::async_trait]
    impl ProtocolHandler for CountingHandler {
        fn protocol_id(&self) -> ProtocolId {
            self.protocol_id
        }

        async fn on_message(&self, _manager: &ExchangeManager, _session_id: SessionId, _exchange_id: ExchangeId, _message_type: MessageType, _payload: Vec<u8>) {
            self.calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn unsecured_datagram(exchange_id: ExchangeId, counter: u32) -> Vec<u8> {
        let message = Message {
            packet_header: PacketHeader {
                flags: PacketHeaderFlags { has_source_node_id: true },
                session_id: SessionId(0),
                message_counter: counter,
                source_node_id: Some(NodeId(9)),
                destination: Some(Destination::Node(NodeId(1))),
            },
            payload_header: PayloadHeader {
                exchange_id,
                protocol_id: ProtocolId::INTERACTION_MODEL,
                message_type: MessageType::READ_REQUEST,
                flags: PayloadHeaderFlags {
                    initiator: true,
                    acknowledgement: false,
                    requires_ack: false,
                    reliable: false,
                },
                acknowledged_counter: None,
            },
            application_payload: b"hello".to_vec(),
        };
        message.encode_unsecured(1280).expect("encode")
    }

    #[tokio::test]
    async fn duplicate_message_counter_is_not_redelivered_to_the_handler() {
        let manager = manager_with_udp().await;
        let handler = CountingHandler::new(ProtocolId::INTERACTION_MODEL);
        manager.add_protocol_handler(handler.clone()).await;

        let source: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let raw = unsecured_datagram(ExchangeId(1), 5);

        manager.on_datagram(&raw, source).await.expect("first delivery");
        assert_eq!(handler.call_count(), 1);

        manager.on_datagram(&raw, source).await.expect("duplicate is not an error");
        assert_eq!(handler.call_count(), 1, "duplicate counter must not be redelivered");
    }

    #[tokio::test]
    async fn unsecured_sessions_are_tracked_per_initiator() {
        let manager = manager_with_udp().await;
        let handler = CountingHandler::new(ProtocolId::INTERACTION_MODEL);
        manager.add_protocol_handler(handler.clone()).await;

        let source: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        manager
            .on_datagram(&unsecured_datagram(ExchangeId(1), 1), source)
            .await
            .expect("first message");
        manager
            .on_datagram(&unsecured_datagram(ExchangeId(2), 2), source)
            .await
            .expect("second message, fresh counter");

        assert_eq!(handler.call_count(), 2);
    }

    #[tokio::test]
    async fn group_addressed_packets_decode_and_dispatch() {
        use matter_session::group::GroupKey;
        use matter_types::GroupId;

        let manager = manager_with_udp().await;
        let handler = CountingHandler::new(ProtocolId::INTERACTION_MODEL);
        manager.add_protocol_handler(handler.clone()).await;

        let group = GroupId(3);
        let group_key = [7u8; KEY_SIZE];
        manager
            .sessions
            .group_keys()
            .write()
            .await
            .install(group, GroupKey { key: group_key });

        let message = Message {
            packet_header: PacketHeader {
                flags: PacketHeaderFlags { has_source_node_id: true },
                session_id: SessionId(0),
                message_counter: 1,
                source_node_id: Some(NodeId(9)),
                destination: Some(Destination::Group(group)),
            },
            payload_header: PayloadHeader {
                exchange_id: ExchangeId(1),
                protocol_id: ProtocolId::INTERACTION_MODEL,
                message_type: MessageType::READ_REQUEST,
                flags: PayloadHeaderFlags {
                    initiator: true,
                    acknowledgement: false,
                    requires_ack: false,
                    reliable: false,
                },
                acknowledged_counter: None,
            },
            application_payload: b"group payload".to_vec(),
        };
        let (aad, plaintext) = message.split_for_secure();
        let nonce = aead::build_nonce(0, 1, NodeId(9).value());
        let ciphertext = aead::encrypt(&group_key, &nonce, &plaintext, &aad).expect("encrypt");
        let mut raw = aad;
        raw.extend_from_slice(&ciphertext);

        let source: SocketAddr = "127.0.0.1:9002".parse().unwrap();
        manager.on_datagram(&raw, source).await.expect("group delivery");
        assert_eq!(handler.call_count(), 1);

        manager.on_datagram(&raw, source).await.expect("duplicate group delivery");
        assert_eq!(handler.call_count(), 1, "duplicate group counter must not be redelivered");
    }

    #[tokio::test]
    async fn close_exchange_now_defers_until_the_owed_ack_is_sent() {
        let sessions = Arc::new(SessionManager::new());
        let transport = Arc::new(UdpTransport::bind(UdpConfig::default()).await.expect("bind"));
        let manager = ExchangeManager::new(NodeId(1), transport, sessions.clone());

        let peer = Arc::new(UdpTransport::bind(UdpConfig::default()).await.expect("bind peer"));
        let peer_addr = peer.local_addr().expect("peer addr");

        let session_id = establish_test_session(&sessions).await;
        manager.set_peer_addr(session_id, peer_addr).await;

        let exchange_id = ExchangeId(1);
        manager
            .exchanges
            .write()
            .await
            .insert((session_id, exchange_id), Arc::new(Mutex::new(Exchange::new(exchange_id, session_id, ProtocolId::INTERACTION_MODEL, Role::Responder))));
        manager.exchange_order.write().await.push((session_id, exchange_id));
        manager
            .exchanges
            .read()
            .await
            .get(&(session_id, exchange_id))
            .unwrap()
            .lock()
            .await
            .set_pending_ack(42);

        manager.close_exchange_now(session_id, exchange_id, ExchangeCloseReason::Completed).await;
        assert_eq!(manager.open_exchange_count().await, 1, "must stay open until the owed ack is actually sent");

        manager
            .send(session_id, exchange_id, MessageType::STATUS_RESPONSE, Vec::new(), false)
            .await
            .expect("send the owed ack");
        assert_eq!(manager.open_exchange_count().await, 0, "closes once the owed ack has gone out");
    }
}
