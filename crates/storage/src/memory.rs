//! MemoryStore: in-process backend for tests and simulation
//!
//! Buckets live in a `DashMap`; each bucket is a `BTreeMap` behind its own
//! `parking_lot::RwLock`, so writes to different buckets never contend and
//! `list` returns keys in ascending lexicographic order. Time-bucketed
//! layers rely on that ordering for deterministic time order.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use stow_core::{Entry, Payload, Store, StowResult};
use tracing::debug;

type Bucket = Arc<RwLock<BTreeMap<String, Payload>>>;

/// In-memory blob store
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: DashMap<String, Bucket>,
}

impl MemoryStore {
    /// Create an empty store with no buckets
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, bucket: &str) -> Option<Bucket> {
        self.buckets.get(bucket).map(|b| Arc::clone(b.value()))
    }

    fn put(&self, bucket: &str, key: &str, payload: Payload) -> bool {
        match self.bucket(bucket) {
            Some(b) => {
                b.write().insert(key.to_string(), payload);
                true
            }
            None => {
                debug!(target: "stow::storage", bucket, key, "Write to missing bucket");
                false
            }
        }
    }

    /// Number of keys in a bucket, `None` if the bucket does not exist
    pub fn bucket_len(&self, bucket: &str) -> Option<usize> {
        self.bucket(bucket).map(|b| b.read().len())
    }

    /// Remove every key of a bucket, keeping the bucket itself
    pub fn clear_bucket(&self, bucket: &str) -> bool {
        match self.bucket(bucket) {
            Some(b) => {
                b.write().clear();
                true
            }
            None => false,
        }
    }
}

/// Entries of a sorted map whose key starts with `prefix`, in key order
pub(crate) fn prefix_range<V, T>(
    map: &BTreeMap<String, V>,
    prefix: &str,
    mut f: impl FnMut(&String, &V) -> Option<T>,
) -> Vec<T> {
    map.range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .filter_map(|(k, v)| f(k, v))
        .collect()
}

impl Store for MemoryStore {
    type Item = Entry;

    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool> {
        Ok(self.put(bucket, key, Payload::Bytes(data.to_vec())))
    }

    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool> {
        Ok(self.put(bucket, key, Payload::Text(data.to_string())))
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        self.bucket(bucket).map_or(false, |b| b.read().contains_key(key))
    }

    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<Entry>> {
        Ok(self
            .bucket(bucket)
            .and_then(|b| b.read().get(key).cloned())
            .map(|payload| Entry::new(key, payload)))
    }

    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = Entry> + 'a> {
        let Some(b) = self.bucket(bucket) else {
            return Box::new(std::iter::empty());
        };
        let snapshot = prefix_range(&b.read(), prefix, |k, v| Some(Entry::new(k.clone(), v.clone())));
        Box::new(snapshot.into_iter())
    }

    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool {
        match self.buckets.entry(bucket.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(target: "stow::storage", bucket, location, prevent_public_access, "Creating bucket");
                slot.insert(Arc::default());
                true
            }
        }
    }

    fn delete_bucket(&self, bucket: &str) -> bool {
        self.buckets.remove(bucket).is_some()
    }

    fn delete(&self, bucket: &str, key: &str) -> bool {
        self.bucket(bucket)
            .map_or(false, |b| b.write().remove(key).is_some())
    }
}
