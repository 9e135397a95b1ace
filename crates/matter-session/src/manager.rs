//! The session table: creates, looks up, and retires sessions, and
//! broadcasts lifecycle events for diagnostics/subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};

use matter_crypto::aead;
use matter_types::{ExchangeId, GroupId, NodeId, Role, SessionId};

use crate::counter::ReceptionState;
use crate::group::GroupKeyRegistry;
use crate::session::{Session, SessionType};
use crate::{Result, SessionError};

/// Lifecycle events the session manager broadcasts. Subscribers (e.g.
/// diagnostics, or tests) get a best-effort feed; a lagging subscriber
/// only misses events, it never blocks the manager.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Added { session_id: SessionId, peer_node_id: NodeId },
    Removed { session_id: SessionId },
    /// The exchange layer is about to retransmit a reliably-sent
    /// message on this session for the `attempt`th time (2 = first
    /// retransmit, matching `attempts` in `RetransmissionTracker`).
    Retry {
        session_id: SessionId,
        exchange_id: ExchangeId,
        attempt: u8,
    },
}

/// Owns every secure session this node currently has open.
///
/// Unsecured (PASE-bootstrap) traffic uses the reserved session id 0
/// and never appears in the table; callers identify it by checking the
/// packet header's security flags before looking anything up here.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    next_session_id: AtomicU16,
    group_keys: RwLock<GroupKeyRegistry>,
    /// Lazily-created unsecured (PASE-bootstrap) sessions, keyed by the
    /// initiator's node id rather than a wire session id (every one of
    /// them carries the reserved id 0), so concurrent bootstraps from
    /// different peers don't share replay state.
    unsecured_sessions: RwLock<HashMap<NodeId, Arc<Mutex<Session>>>>,
    /// Per-(sender, group) replay windows for group traffic, which has
    /// no session table entry to hang a `ReceptionState` off of.
    group_reception: RwLock<HashMap<(NodeId, GroupId), ReceptionState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(64);
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU16::new(1),
            group_keys: RwLock::new(GroupKeyRegistry::new()),
            unsecured_sessions: RwLock::new(HashMap::new()),
            group_reception: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Allocate a fresh locally-scoped session id. Session id 0 is
    /// reserved for unsecured traffic, so allocation starts at 1 and
    /// skips back to 1 on 16-bit wraparound.
    fn allocate_session_id(&self) -> SessionId {
        loop {
            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return SessionId(id);
            }
        }
    }

    /// Install a newly established session, keyed by its local session
    /// id, and broadcast [`SessionEvent::Added`].
    pub async fn insert(
        &self,
        peer_session_id: SessionId,
        session_type: SessionType,
        peer_node_id: NodeId,
        local_role: Role,
        keys: matter_crypto::kdf::SessionKeys,
        local_fabric_index: matter_types::FabricIndex,
        starting_counter: u32,
    ) -> SessionId {
        let local_session_id = self.allocate_session_id();
        let session = Session::new(
            local_session_id,
            peer_session_id,
            session_type,
            local_fabric_index,
            peer_node_id,
            local_role,
            keys,
            starting_counter,
        );

        self.sessions
            .write()
            .await
            .insert(local_session_id, Arc::new(Mutex::new(session)));

        let _ = self.events.send(SessionEvent::Added {
            session_id: local_session_id,
            peer_node_id,
        });

        local_session_id
    }

    /// Look up the session keyed by `local_session_id`.
    pub async fn get(&self, local_session_id: SessionId) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .await
            .get(&local_session_id)
            .cloned()
            .ok_or(SessionError::UnknownSession(local_session_id))
    }

    /// Remove a session (peer-initiated close, or local eviction) and
    /// broadcast [`SessionEvent::Removed`].
    pub async fn remove(&self, local_session_id: SessionId) {
        if self.sessions.write().await.remove(&local_session_id).is_some() {
            let _ = self.events.send(SessionEvent::Removed {
                session_id: local_session_id,
            });
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Access to the node's group key registry, for the transport
    /// receive path to resolve candidate keys for an incoming group
    /// message before any session lookup is possible.
    pub fn group_keys(&self) -> &RwLock<GroupKeyRegistry> {
        &self.group_keys
    }

    /// Return the tracked unsecured (PASE-bootstrap) session for
    /// `initiator_node_id`, creating one on first sight. Unsecured
    /// traffic shares the reserved wire session id 0, so this registry
    /// is keyed by node id instead to give each concurrent bootstrap
    /// its own replay window.
    pub async fn unsecured_session(&self, initiator_node_id: NodeId) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.unsecured_sessions.read().await.get(&initiator_node_id).cloned() {
            return existing;
        }
        let mut sessions = self.unsecured_sessions.write().await;
        if let Some(existing) = sessions.get(&initiator_node_id).cloned() {
            return existing;
        }
        let session = Session::new(
            SessionId(0),
            SessionId(0),
            SessionType::Unsecured,
            matter_types::FabricIndex::NONE,
            initiator_node_id,
            Role::Responder,
            matter_crypto::kdf::SessionKeys {
                encrypt_key: [0u8; aead::KEY_SIZE],
                decrypt_key: [0u8; aead::KEY_SIZE],
            },
            0,
        );
        let session = Arc::new(Mutex::new(session));
        sessions.insert(initiator_node_id, session.clone());
        session
    }

    /// Decrypt an inbound group-addressed packet, trying every key
    /// installed for `group_id` newest-first until one verifies, and
    /// updating that `(source node, group)` pair's replay window.
    /// Fails with [`SessionError::GroupKeyNotFound`] if none does.
    /// Returns the decrypted plaintext and whether `message_counter`
    /// was a duplicate.
    pub async fn decode_group_packet(
        &self,
        group_id: GroupId,
        source_node_id: NodeId,
        message_counter: u32,
        aad: &[u8],
        ciphertext: &[u8],
        nonce: &[u8; aead::NONCE_SIZE],
    ) -> Result<(Vec<u8>, bool)> {
        let candidates = self.group_keys.read().await.keys_for(group_id).to_vec();
        for candidate in &candidates {
            if let Ok(plaintext) = aead::decrypt(&candidate.key, nonce, ciphertext, aad) {
                let mut reception = self.group_reception.write().await;
                let is_duplicate = !reception.entry((source_node_id, group_id)).or_default().accept(message_counter);
                return Ok((plaintext, is_duplicate));
            }
        }
        Err(SessionError::GroupKeyNotFound(group_id))
    }

    /// Notify subscribers that the exchange layer is about to retry a
    /// send on `session_id`/`exchange_id` for the `attempt`th time.
    pub fn notify_retry(&self, session_id: SessionId, exchange_id: ExchangeId, attempt: u8) {
        let _ = self.events.send(SessionEvent::Retry {
            session_id,
            exchange_id,
            attempt,
        });
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matter_crypto::aead::KEY_SIZE;
    use matter_crypto::kdf::SessionKeys;
    use matter_types::FabricIndex;

    fn test_keys() -> SessionKeys {
        SessionKeys {
            encrypt_key: [1u8; KEY_SIZE],
            decrypt_key: [2u8; KEY_SIZE],
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let manager = SessionManager::new();
        let id = manager
            .insert(
                SessionId(7),
                SessionType::Unicast,
                NodeId(42),
                Role::Initiator,
                test_keys(),
                FabricIndex(1),
                0,
            )
            .await;

        assert!(manager.get(id).await.is_ok());
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_session_errors() {
        let manager = SessionManager::new();
        let err = manager.get(SessionId(999)).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn remove_broadcasts_event() {
        let manager = SessionManager::new();
        let mut events = manager.subscribe();

        let id = manager
            .insert(
                SessionId(7),
                SessionType::Unicast,
                NodeId(42),
                Role::Initiator,
                test_keys(),
                FabricIndex(1),
                0,
            )
            .await;
        let _ = events.recv().await.expect("added event");

        manager.remove(id).await;
        let removed = events.recv().await.expect("removed event");
        assert!(matches!(removed, SessionEvent::Removed { .. }));
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn session_id_zero_is_never_allocated() {
        let manager = SessionManager::new();
        manager.next_session_id.store(0, Ordering::Relaxed);
        let id = manager
            .insert(
                SessionId(1),
                SessionType::Unicast,
                NodeId(1),
                Role::Initiator,
                test_keys(),
                FabricIndex(1),
                0,
            )
            .await;
        assert_ne!(id.value(), 0);
    }

    #[tokio::test]
    async fn unsecured_session_is_created_once_and_reused_per_initiator() {
        let manager = SessionManager::new();
        let a = manager.unsecured_session(NodeId(1)).await;
        let b = manager.unsecured_session(NodeId(1)).await;
        assert!(Arc::ptr_eq(&a, &b));

        let c = manager.unsecured_session(NodeId(2)).await;
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn decode_group_packet_tries_candidate_keys_newest_first() {
        use crate::group::GroupKey;

        let manager = SessionManager::new();
        let group = GroupId(5);
        manager.group_keys().write().await.install(group, GroupKey { key: [1u8; KEY_SIZE] });
        manager.group_keys().write().await.install(group, GroupKey { key: [2u8; KEY_SIZE] });

        let nonce = aead::build_nonce(0, 1, NodeId(9).value());
        let ciphertext = aead::encrypt(&[1u8; KEY_SIZE], &nonce, b"group payload", b"aad").expect("encrypt");

        let (plaintext, is_duplicate) = manager
            .decode_group_packet(group, NodeId(9), 1, b"aad", &ciphertext, &nonce)
            .await
            .expect("decode with the older key");
        assert_eq!(plaintext, b"group payload");
        assert!(!is_duplicate);

        let (_, is_duplicate) = manager
            .decode_group_packet(group, NodeId(9), 1, b"aad", &ciphertext, &nonce)
            .await
            .expect("decode again");
        assert!(is_duplicate);
    }

    #[tokio::test]
    async fn decode_group_packet_fails_without_a_matching_key() {
        let manager = SessionManager::new();
        let nonce = aead::build_nonce(0, 1, NodeId(9).value());
        let err = manager
            .decode_group_packet(GroupId(1), NodeId(9), 1, b"aad", b"not real ciphertext", &nonce)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::GroupKeyNotFound(_)));
    }

    #[tokio::test]
    async fn notify_retry_broadcasts_a_retry_event() {
        let manager = SessionManager::new();
        let mut events = manager.subscribe();
        manager.notify_retry(SessionId(1), ExchangeId(1), 2);
        let event = events.recv().await.expect("retry event");
        assert!(matches!(event, SessionEvent::Retry { attempt: 2, .. }));
    }
}
