//! AnyStore: runtime-selected backend
//!
//! Layers are generic over [`Store`]; `AnyStore` lets a configuration file
//! pick the backend without the caller naming a concrete type.

use stow_core::{Entry, Store, StowResult, VersionedStore};

use crate::fs::FileStore;
use crate::memory::MemoryStore;
use crate::versioned::{VersionedFileStore, VersionedMemoryStore};

/// One of the bundled backends
#[derive(Debug)]
pub enum AnyStore {
    /// Plain filesystem
    File(FileStore),
    /// Plain memory
    Memory(MemoryStore),
    /// Versioned filesystem
    VersionedFile(VersionedFileStore),
    /// Versioned memory
    VersionedMemory(VersionedMemoryStore),
}

macro_rules! dispatch {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            AnyStore::File($store) => $body,
            AnyStore::Memory($store) => $body,
            AnyStore::VersionedFile($store) => $body,
            AnyStore::VersionedMemory($store) => $body,
        }
    };
}

impl AnyStore {
    /// Versioned view of the backend, if it keeps history
    pub fn as_versioned(&self) -> Option<&dyn VersionedStore<Item = Entry>> {
        match self {
            AnyStore::VersionedFile(s) => Some(s),
            AnyStore::VersionedMemory(s) => Some(s),
            AnyStore::File(_) | AnyStore::Memory(_) => None,
        }
    }

    /// Whether the backend keeps history
    pub fn is_versioned(&self) -> bool {
        self.as_versioned().is_some()
    }
}

impl Store for AnyStore {
    type Item = Entry;

    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool> {
        dispatch!(self, s => s.write_bytes(bucket, key, data))
    }

    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool> {
        dispatch!(self, s => s.write_text(bucket, key, data))
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        dispatch!(self, s => s.exists(bucket, key))
    }

    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<Entry>> {
        dispatch!(self, s => s.read(bucket, key))
    }

    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = Entry> + 'a> {
        dispatch!(self, s => s.list(bucket, prefix))
    }

    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool {
        dispatch!(self, s => s.create_bucket(bucket, location, prevent_public_access))
    }

    fn delete_bucket(&self, bucket: &str) -> bool {
        dispatch!(self, s => s.delete_bucket(bucket))
    }

    fn delete(&self, bucket: &str, key: &str) -> bool {
        dispatch!(self, s => s.delete(bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_reaches_backend() {
        let store = AnyStore::Memory(MemoryStore::new());
        assert!(store.create_bucket("b", "", false));
        assert!(store.write_text("b", "k", "v").unwrap());
        assert_eq!(store.load_text("b", "k").unwrap().as_deref(), Some("v"));
        assert!(store.as_versioned().is_none());
    }

    #[test]
    fn test_versioned_view() {
        let store = AnyStore::VersionedMemory(VersionedMemoryStore::new());
        store.create_bucket("b", "", false);
        store.write_text("b", "k", "1").unwrap();
        store.write_text("b", "k", "2").unwrap();
        let versioned = store.as_versioned().unwrap();
        assert_eq!(versioned.versions("b", "k").count(), 2);
    }
}
