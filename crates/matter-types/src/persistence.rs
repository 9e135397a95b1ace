//! The persistence interface consumed by sessions and the (external)
//! certificate authority.
//!
//! The core neither chooses a storage backend nor serializes its own
//! state beyond calling through this interface. Real backends (sqlite,
//! flash, …) are out of scope; `matter-node` ships an in-memory
//! implementation for tests and the demo binary only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors a `KvStore` implementation may report.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The named context does not exist and the backend does not
    /// auto-create contexts.
    #[error("unknown persistence context: {0}")]
    UnknownContext(String),
    /// Backend-specific I/O failure.
    #[error("persistence backend error: {0}")]
    Backend(String),
}

/// A keyed byte-value store, scoped to one named context.
pub trait KvStore: Send + Sync {
    /// Fetch the value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;
    /// Store `value` under `key`, replacing any existing value.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError>;
    /// Remove `key` if present; absent keys are not an error.
    fn delete(&self, key: &str) -> Result<(), PersistenceError>;
    /// Snapshot all key/value pairs currently in the context.
    fn values(&self) -> Result<HashMap<String, Vec<u8>>, PersistenceError>;
}

/// A registry of named persistence contexts (e.g. "fabrics", "sessions",
/// "acl").
pub trait PersistenceContext: Send + Sync {
    /// Obtain the store backing the named context, creating it on first
    /// use if the backend supports that.
    fn context(&self, name: &str) -> Result<Arc<dyn KvStore>, PersistenceError>;
}

/// A simple in-memory `KvStore`, useful for unit tests and the demo
/// binary. Not suitable as a real device's persistence backend.
#[derive(Default)]
pub struct MapKvStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl KvStore for MapKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.inner.lock().expect("kv lock poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError> {
        self.inner
            .lock()
            .expect("kv lock poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.lock().expect("kv lock poisoned").remove(key);
        Ok(())
    }

    fn values(&self) -> Result<HashMap<String, Vec<u8>>, PersistenceError> {
        Ok(self.inner.lock().expect("kv lock poisoned").clone())
    }
}

/// A `PersistenceContext` that lazily creates an in-memory [`MapKvStore`]
/// per named context.
#[derive(Default)]
pub struct MapPersistenceContext {
    contexts: Mutex<HashMap<String, Arc<dyn KvStore>>>,
}

impl PersistenceContext for MapPersistenceContext {
    fn context(&self, name: &str) -> Result<Arc<dyn KvStore>, PersistenceError> {
        let mut contexts = self.contexts.lock().expect("context lock poisoned");
        Ok(contexts
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MapKvStore::default()) as Arc<dyn KvStore>)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_roundtrip() {
        let store = MapKvStore::default();
        store.set("k", vec![1, 2, 3]).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(vec![1, 2, 3]));
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn contexts_are_independent_and_reused() {
        let ctx = MapPersistenceContext::default();
        let fabrics = ctx.context("fabrics").unwrap();
        let sessions = ctx.context("sessions").unwrap();
        fabrics.set("a", vec![1]).unwrap();
        assert_eq!(sessions.get("a").unwrap(), None);

        let fabrics_again = ctx.context("fabrics").unwrap();
        assert_eq!(fabrics_again.get("a").unwrap(), Some(vec![1]));
    }

    #[test]
    fn values_snapshot() {
        let store = MapKvStore::default();
        store.set("a", vec![1]).unwrap();
        store.set("b", vec![2]).unwrap();
        let snap = store.values().unwrap();
        assert_eq!(snap.len(), 2);
    }
}
