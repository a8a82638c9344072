//! VersionedMap: ordered map keeping every value ever written per key
//!
//! Each key owns a history, newest first. `put` prepends, so the latest
//! value is always at position 0 and older generations shift back by one.
//! Version ids come from the process-wide [`VersionClock`] and are issued
//! while the write lock is held, so history order and id order agree.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;
use stow_core::{VersionClock, VersionId};

type History<V> = VecDeque<(VersionId, V)>;

/// Ordered multi-version map
#[derive(Debug)]
pub struct VersionedMap<K, V> {
    inner: RwLock<BTreeMap<K, History<V>>>,
}

impl<K: Ord, V> Default for VersionedMap<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<K: Ord + Clone, V: Clone> VersionedMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new latest value for `key` and return its version id
    pub fn put(&self, key: K, value: V) -> VersionId {
        let mut inner = self.inner.write();
        let version = VersionClock::global().next_id();
        inner
            .entry(key)
            .or_default()
            .push_front((version.clone(), value));
        version
    }

    /// Latest value of a key
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner
            .read()
            .get(key)
            .and_then(|h| h.front())
            .map(|(_, v)| v.clone())
    }

    /// Whether the key has any history
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Drop a key and its whole history, returning the latest value
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner
            .write()
            .remove(key)
            .and_then(|mut h| h.pop_front())
            .map(|(_, v)| v)
    }

    /// Version ids of a key, most recent first
    pub fn versions(&self, key: &K) -> Vec<VersionId> {
        self.inner
            .read()
            .get(key)
            .map(|h| h.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    /// Value of a key at a version id
    pub fn data_at_version(&self, key: &K, version: &VersionId) -> Option<V> {
        self.inner
            .read()
            .get(key)?
            .iter()
            .find(|(id, _)| id == version)
            .map(|(_, v)| v.clone())
    }

    /// Value `position` generations back from the latest (0 = latest)
    pub fn at_position(&self, key: &K, position: usize) -> Option<V> {
        self.inner
            .read()
            .get(key)?
            .get(position)
            .map(|(_, v)| v.clone())
    }

    /// Number of versions recorded for a key
    pub fn history_len(&self, key: &K) -> usize {
        self.inner.read().get(key).map_or(0, |h| h.len())
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True if no key has any history
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// All keys in ascending order
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().keys().cloned().collect()
    }

    /// Drop every key
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<V: Clone> VersionedMap<String, V> {
    /// `(key, latest value)` for every key starting with `prefix`, in key order
    pub fn latest_with_prefix(&self, prefix: &str) -> Vec<(String, V)> {
        crate::memory::prefix_range(&self.inner.read(), prefix, |k, h| {
            h.front().map(|(_, v)| (k.clone(), v.clone()))
        })
    }
}
