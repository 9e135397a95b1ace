//! matter-node: a standalone core node process.
//!
//! Wires the transport, session, exchange, and interaction layers
//! together into one running node and drives a `ReadRequest` against
//! itself over a loopback socket, as a human-operable demo of the
//! stack — not part of the protocol core itself.

mod config;
mod demo_cluster;
mod error;

use std::sync::Arc;

use tracing::info;

use matter_crypto::aead::KEY_SIZE;
use matter_crypto::kdf::SessionKeys;
use matter_exchange::ExchangeManager;
use matter_interaction::{InteractionClientMessenger, InteractionMessenger, InteractionServerHandler};
use matter_session::session::SessionType;
use matter_session::SessionManager;
use matter_transport::udp::{UdpConfig, UdpTransport};
use matter_types::persistence::{MapPersistenceContext, PersistenceContext};
use matter_types::{FabricIndex, NodeId, Role, SessionId, MAX_UDP_PAYLOAD_SIZE};
use matter_wire::datamodel::{AttributePath, ReadRequestPayload};

use config::NodeConfig;
use demo_cluster::{DemoAttributeSource, DemoEventSource};
use error::{CoreError, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "matter_node=info"
                    .parse()
                    .expect("static directive always parses"),
            ),
        )
        .init();

    info!("matter-node starting");

    let config = NodeConfig::load().map_err(CoreError::Config)?;
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir).map_err(matter_transport::TransportError::Io)?;
    info!(?data_dir, "data directory ready");

    // Persistence is in-memory only; a real backend is out of scope
    // for this core (see matter_types::persistence).
    let persistence: Arc<dyn PersistenceContext> = Arc::new(MapPersistenceContext::default());
    let _fabrics = persistence.context("fabrics")?;

    let bind_ip = if config.network.interface.is_empty() {
        "0.0.0.0".to_string()
    } else {
        config.network.interface.clone()
    };
    let bind_addr = format!("{bind_ip}:{}", config.network.listen_port)
        .parse()
        .map_err(|e| CoreError::Config(anyhow::anyhow!("invalid network.interface: {e}")))?;
    let transport = Arc::new(UdpTransport::bind(UdpConfig { bind_addr }).await?);
    info!(local_addr = ?transport.local_addr()?, "transport bound");

    let sessions = Arc::new(SessionManager::new());
    let local_node_id = NodeId(1);

    // The demo is its own peer: a session whose encrypt/decrypt keys
    // are identical, so what this node sends to itself it can also
    // read back. A real node derives these from PASE/CASE instead.
    let demo_key = [7u8; KEY_SIZE];
    let demo_keys = SessionKeys {
        encrypt_key: demo_key,
        decrypt_key: demo_key,
    };
    let session_id = sessions
        .insert(
            SessionId(1),
            SessionType::Unicast,
            local_node_id,
            Role::Initiator,
            demo_keys,
            FabricIndex(1),
            0,
        )
        .await;

    let manager = ExchangeManager::new(local_node_id, transport.clone(), sessions);
    let self_addr = transport.local_addr()?;
    manager.set_peer_addr(session_id, self_addr).await;

    let attributes = Arc::new(DemoAttributeSource::new());
    let events = Arc::new(DemoEventSource);
    let server = Arc::new(InteractionServerHandler::new(attributes, events, MAX_UDP_PAYLOAD_SIZE));
    let messenger = InteractionMessenger::new(Some(server));
    manager.add_protocol_handler(messenger.clone()).await;

    let client = InteractionClientMessenger::new(manager.clone(), messenger, MAX_UDP_PAYLOAD_SIZE);

    let retransmit_manager = manager.clone();
    tokio::spawn(retransmit_manager.run_retransmit_loop());

    let dispatch_manager = manager.clone();
    let dispatch_transport = transport.clone();
    tokio::spawn(async move {
        loop {
            match dispatch_transport.recv_from().await {
                Ok((raw, source)) => {
                    if let Err(err) = dispatch_manager.on_datagram(&raw, source).await {
                        tracing::warn!(%err, "failed to dispatch inbound datagram");
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "transport receive failed, stopping dispatch loop");
                    return;
                }
            }
        }
    });

    let request = ReadRequestPayload {
        attribute_requests: vec![AttributePath {
            endpoint: 1,
            cluster: 6,
            attribute: 0,
            list_index: None,
        }],
        event_requests: vec![],
        data_version_filters: vec![],
        fabric_filtered: false,
    };

    let report = client.read(session_id, request).await?;
    info!(
        attribute_reports = report.attribute_reports.len(),
        event_reports = report.event_reports.len(),
        "read request completed"
    );

    manager.shutdown().await;
    info!("matter-node stopped");
    Ok(())
}
