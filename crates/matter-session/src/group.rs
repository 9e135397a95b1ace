//! Group key registry.
//!
//! Multicast group traffic is secured with a key shared by every group
//! member rather than a per-session derived key. A node may hold
//! several group keys (one per group it belongs to, possibly with an
//! "epoch" predecessor during a key rotation); this registry is the
//! lookup the transport-receive path uses to find a candidate key for
//! an incoming group message before it can even identify a session.

use std::collections::HashMap;

use matter_types::GroupId;

/// One operational group key: an index slot (current/old, for rollover)
/// plus the raw symmetric key material.
#[derive(Clone)]
pub struct GroupKey {
    pub key: [u8; 32],
}

/// Registry of group keys known to this node, keyed by group id.
///
/// A real commissioned node holds keys per fabric; this registry is
/// fabric-agnostic and left to the caller to partition, matching how
/// the rest of this crate treats fabric scoping as the caller's
/// responsibility rather than baking it into key storage.
#[derive(Default)]
pub struct GroupKeyRegistry {
    keys: HashMap<GroupId, Vec<GroupKey>>,
}

impl GroupKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new key for `group`. Keys are tried newest-first on
    /// decrypt, so a rotation can install the new key before revoking
    /// the old one without dropping in-flight traffic.
    pub fn install(&mut self, group: GroupId, key: GroupKey) {
        self.keys.entry(group).or_default().insert(0, key);
    }

    /// Drop the oldest key for `group`, keeping only the most recent
    /// `keep` entries. Used once a rotation's grace period elapses.
    pub fn prune(&mut self, group: GroupId, keep: usize) {
        if let Some(keys) = self.keys.get_mut(&group) {
            keys.truncate(keep);
        }
    }

    /// Candidate keys for `group`, newest first.
    pub fn keys_for(&self, group: GroupId) -> &[GroupKey] {
        self.keys.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_keys_are_newest_first() {
        let mut registry = GroupKeyRegistry::new();
        registry.install(GroupId(1), GroupKey { key: [1u8; 32] });
        registry.install(GroupId(1), GroupKey { key: [2u8; 32] });

        let keys = registry.keys_for(GroupId(1));
        assert_eq!(keys[0].key, [2u8; 32]);
        assert_eq!(keys[1].key, [1u8; 32]);
    }

    #[test]
    fn prune_keeps_only_newest() {
        let mut registry = GroupKeyRegistry::new();
        registry.install(GroupId(1), GroupKey { key: [1u8; 32] });
        registry.install(GroupId(1), GroupKey { key: [2u8; 32] });
        registry.prune(GroupId(1), 1);
        assert_eq!(registry.keys_for(GroupId(1)).len(), 1);
        assert_eq!(registry.keys_for(GroupId(1))[0].key, [2u8; 32]);
    }

    #[test]
    fn unknown_group_has_no_keys() {
        let registry = GroupKeyRegistry::new();
        assert!(registry.keys_for(GroupId(99)).is_empty());
    }
}
