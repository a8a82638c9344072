//! Per-key mutual exclusion
//!
//! Writers to the same key serialise on one mutex; writers to different
//! keys never share a lock. Mutexes are created on first use and evicted
//! once no caller holds or awaits them, so the table only holds keys that
//! are in use.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Table of lazily created per-key mutexes
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutex guarding `key`
    ///
    /// The map shard is released before the caller locks the mutex, so a
    /// long critical section never blocks unrelated keys.
    pub fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.get(key) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.locks.entry(key.to_string()).or_default().value())
    }

    /// Run `f` while holding the lock for `key`
    ///
    /// The entry is evicted afterwards unless another caller still holds a
    /// handle to it.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(key);
        let result = {
            let _guard = handle.lock();
            f()
        };
        drop(handle);
        // The map's own reference is the last one
        self.locks.remove_if(key, |_, m| Arc::strong_count(m) == 1);
        result
    }

    /// Number of keys currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if no key is held or awaited
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
