//! Integration test crate for the Matter core.
//!
//! This crate has no library code of its own beyond a shared two-node
//! test harness; `tests/*.rs` exercise end-to-end protocol flows
//! across the `matter-*` workspace crates over a real loopback UDP
//! transport (two distinct sockets, not one node talking to itself).
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p matter-integration-tests
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use matter_crypto::aead::KEY_SIZE;
use matter_crypto::kdf::SessionKeys;
use matter_exchange::ExchangeManager;
use matter_interaction::data_source::AttributeRead;
use matter_interaction::{AttributeDataSource, EventDataSource, InteractionClientMessenger, InteractionMessenger, InteractionServerHandler};
use matter_session::session::SessionType;
use matter_session::SessionManager;
use matter_transport::udp::{UdpConfig, UdpTransport};
use matter_types::{FabricIndex, NodeId, Role, SessionId};
use matter_wire::datamodel::{AttributePath, EventPath, EventReportPayload};
use matter_wire::tlv::TlvElement;

/// An in-memory cluster store, one per test node, preloaded by the
/// test that builds it.
pub struct TestAttributeSource {
    values: std::sync::Mutex<std::collections::HashMap<(u16, u32, u32), AttributeRead>>,
}

impl TestAttributeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            values: std::sync::Mutex::new(std::collections::HashMap::new()),
        })
    }

    pub fn set(&self, path: &AttributePath, value: AttributeRead) {
        self.values
            .lock()
            .expect("test attribute lock poisoned")
            .insert((path.endpoint, path.cluster, path.attribute), value);
    }
}

#[async_trait]
impl AttributeDataSource for TestAttributeSource {
    async fn data_version(&self, _path: &AttributePath) -> Option<u32> {
        Some(1)
    }

    async fn read(&self, path: &AttributePath) -> Result<Option<AttributeRead>, matter_types::StatusCode> {
        Ok(self
            .values
            .lock()
            .expect("test attribute lock poisoned")
            .get(&(path.endpoint, path.cluster, path.attribute))
            .cloned())
    }

    async fn write(&self, path: &AttributePath, value: TlvElement) -> matter_types::StatusCode {
        self.set(path, AttributeRead::Value(value));
        matter_types::StatusCode::SUCCESS
    }
}

pub struct EmptyEventSource;

#[async_trait]
impl EventDataSource for EmptyEventSource {
    async fn events_since(&self, _path: &EventPath, _since_event_number: u64) -> Vec<EventReportPayload> {
        Vec::new()
    }
}

fn symmetric_keys(byte: u8) -> SessionKeys {
    let key = [byte; KEY_SIZE];
    SessionKeys {
        encrypt_key: key,
        decrypt_key: key,
    }
}

/// One end of a two-node test topology: its own transport, exchange
/// manager, session to the peer, and a client messenger to drive calls
/// against that peer.
pub struct TestNode {
    pub manager: Arc<ExchangeManager>,
    pub client: InteractionClientMessenger,
    pub session_id: SessionId,
    pub attributes: Arc<TestAttributeSource>,
}

/// Spin up two independent nodes, each bound to its own loopback UDP
/// socket, with mirrored sessions pointing at each other, and a
/// background dispatch loop pumping each node's socket into its
/// exchange manager. Returns (node_a, node_b) where `node_a.client`
/// talks to `node_b`'s server and vice versa.
pub async fn spawn_two_nodes() -> (TestNode, TestNode) {
    let transport_a = Arc::new(UdpTransport::bind(UdpConfig::default()).await.expect("bind a"));
    let transport_b = Arc::new(UdpTransport::bind(UdpConfig::default()).await.expect("bind b"));
    let addr_a = transport_a.local_addr().expect("addr a");
    let addr_b = transport_b.local_addr().expect("addr b");

    let sessions_a = Arc::new(SessionManager::new());
    let sessions_b = Arc::new(SessionManager::new());

    let keys = symmetric_keys(11);
    let session_a = sessions_a
        .insert(
            SessionId(1),
            SessionType::Unicast,
            NodeId(2),
            Role::Initiator,
            SessionKeys {
                encrypt_key: keys.encrypt_key,
                decrypt_key: keys.decrypt_key,
            },
            FabricIndex(1),
            0,
        )
        .await;
    let session_b = sessions_b
        .insert(
            session_a,
            SessionType::Unicast,
            NodeId(1),
            Role::Responder,
            SessionKeys {
                encrypt_key: keys.decrypt_key,
                decrypt_key: keys.encrypt_key,
            },
            FabricIndex(1),
            0,
        )
        .await;

    let manager_a = ExchangeManager::new(NodeId(1), transport_a.clone(), sessions_a);
    let manager_b = ExchangeManager::new(NodeId(2), transport_b.clone(), sessions_b);
    manager_a.set_peer_addr(session_a, addr_b).await;
    manager_b.set_peer_addr(session_b, addr_a).await;

    let attributes_a = TestAttributeSource::new();
    let attributes_b = TestAttributeSource::new();

    let server_a = Arc::new(InteractionServerHandler::new(attributes_a.clone(), Arc::new(EmptyEventSource), 1200));
    let server_b = Arc::new(InteractionServerHandler::new(attributes_b.clone(), Arc::new(EmptyEventSource), 1200));

    let messenger_a = InteractionMessenger::new(Some(server_a));
    let messenger_b = InteractionMessenger::new(Some(server_b));
    manager_a.add_protocol_handler(messenger_a.clone()).await;
    manager_b.add_protocol_handler(messenger_b.clone()).await;

    let client_a = InteractionClientMessenger::new(manager_a.clone(), messenger_a, 1200);
    let client_b = InteractionClientMessenger::new(manager_b.clone(), messenger_b, 1200);

    spawn_dispatch_loop(manager_a.clone(), transport_a);
    spawn_dispatch_loop(manager_b.clone(), transport_b);
    tokio::spawn(manager_a.clone().run_retransmit_loop());
    tokio::spawn(manager_b.clone().run_retransmit_loop());

    (
        TestNode {
            manager: manager_a,
            client: client_a,
            session_id: session_a,
            attributes: attributes_a,
        },
        TestNode {
            manager: manager_b,
            client: client_b,
            session_id: session_b,
            attributes: attributes_b,
        },
    )
}

fn spawn_dispatch_loop(manager: Arc<ExchangeManager>, transport: Arc<UdpTransport>) {
    tokio::spawn(async move {
        loop {
            match transport.recv_from().await {
                Ok((raw, source)) => {
                    let _ = manager.on_datagram(&raw, source).await;
                }
                Err(_) => return,
            }
        }
    });
}
