//! # Object Cache Boundary
//!
//! The engine resolves queue keys against a read-only cache populated by the
//! watch subsystem. The cache hands out shared references; workers clone a
//! private working copy before mutating anything, so the cached object stays
//! structurally immutable to handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Read-only lookup by key, plus the initial-synchronization gate workers
/// wait on before pulling.
pub trait Store<T>: Send + Sync + 'static {
    /// Resolve a key to the current object, or `None` if it was deleted.
    fn get(&self, key: &str) -> Option<Arc<T>>;

    /// Whether the cache has completed its initial full synchronization.
    fn has_synced(&self) -> bool;
}

/// In-memory store backing tests and simple deployments. The watch side
/// inserts and removes objects; the engine only reads.
pub struct MemoryStore<T> {
    objects: DashMap<String, Arc<T>>,
    synced: AtomicBool,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            synced: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, key: impl Into<String>, obj: T) {
        self.objects.insert(key.into(), Arc::new(obj));
    }

    pub fn remove(&self, key: &str) {
        self.objects.remove(key);
    }

    /// Mark the initial synchronization complete, releasing the worker gate.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Store<T> for MemoryStore<T> {
    fn get(&self, key: &str) -> Option<Arc<T>> {
        self.objects.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_shared_reference_to_current_object() {
        let store = MemoryStore::new();
        store.insert("a", 41u32);
        store.insert("a", 42u32);

        let value = store.get("a").expect("present");
        assert_eq!(*value, 42);
        assert!(store.get("b").is_none());
    }

    #[test]
    fn remove_makes_key_not_found() {
        let store = MemoryStore::new();
        store.insert("a", 1u32);
        store.remove("a");
        assert!(store.get("a").is_none());
    }

    #[test]
    fn starts_unsynced_until_marked() {
        let store = MemoryStore::<u32>::new();
        assert!(!store.has_synced());
        store.mark_synced();
        assert!(store.has_synced());
    }
}
