//! VersionedMemoryStore: in-process versioned backend
//!
//! One [`VersionedMap`] per bucket. Listing returns the latest value of
//! each key in ascending key order.

use std::sync::Arc;

use dashmap::DashMap;
use stow_core::{Entry, Payload, Store, StowResult, VersionId, VersionedStore};
use tracing::debug;

use super::map::VersionedMap;

type Bucket = Arc<VersionedMap<String, Payload>>;

/// In-memory store keeping every version of every key
#[derive(Debug, Default)]
pub struct VersionedMemoryStore {
    buckets: DashMap<String, Bucket>,
}

impl VersionedMemoryStore {
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
                let version = b.put(key.to_string(), payload);
                debug!(target: "stow::versioned", bucket, key, %version, "Recorded version");
                true
            }
            None => {
                debug!(target: "stow::versioned", bucket, key, "Write to missing bucket");
                false
            }
        }
    }

    /// Value `position` generations back from the latest (0 = latest)
    pub fn at_position(&self, bucket: &str, key: &str, position: usize) -> Option<Entry> {
        self.bucket(bucket)?
            .at_position(&key.to_string(), position)
            .map(|payload| Entry::new(key, payload))
    }
}

impl Store for VersionedMemoryStore {
    type Item = Entry;

    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool> {
        Ok(self.put(bucket, key, Payload::Bytes(data.to_vec())))
    }

    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool> {
        Ok(self.put(bucket, key, Payload::Text(data.to_string())))
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        self.bucket(bucket)
            .map_or(false, |b| b.contains_key(&key.to_string()))
    }

    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<Entry>> {
        Ok(self
            .bucket(bucket)
            .and_then(|b| b.get(&key.to_string()))
            .map(|payload| Entry::new(key, payload)))
    }

    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = Entry> + 'a> {
        let Some(b) = self.bucket(bucket) else {
            return Box::new(std::iter::empty());
        };
        Box::new(
            b.latest_with_prefix(prefix)
                .into_iter()
                .map(|(key, payload)| Entry::new(key, payload)),
        )
    }

    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool {
        match self.buckets.entry(bucket.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(target: "stow::versioned", bucket, location, prevent_public_access, "Creating bucket");
                slot.insert(Arc::new(VersionedMap::new()));
                true
            }
        }
    }

    fn delete_bucket(&self, bucket: &str) -> bool {
        self.buckets.remove(bucket).is_some()
    }

    fn delete(&self, bucket: &str, key: &str) -> bool {
        self.bucket(bucket)
            .map_or(false, |b| b.remove(&key.to_string()).is_some())
    }
}

impl VersionedStore for VersionedMemoryStore {
    fn versions<'a>(&'a self, bucket: &str, key: &str) -> Box<dyn Iterator<Item = VersionId> + 'a> {
        let ids = self
            .bucket(bucket)
            .map(|b| b.versions(&key.to_string()))
            .unwrap_or_default();
        Box::new(ids.into_iter())
    }

    fn data_at_version(&self, bucket: &str, key: &str, version: &VersionId) -> Option<Entry> {
        self.bucket(bucket)?
            .data_at_version(&key.to_string(), version)
            .map(|payload| Entry::new(key, payload))
    }
}
