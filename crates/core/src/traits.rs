//! Core traits for blob storage
//!
//! This module defines the [`Store`] and [`VersionedStore`] contracts that
//! let the log, queue and schema layers run over any backend.
//!
//! ## Fault classes
//!
//! - Backend I/O faults are caught at the store boundary (see [`safe_run`])
//!   and turned into `false`, `None` or an empty listing.
//! - Reading a missing key is `Ok(None)`, never an error.
//! - Only contract violations (schema mismatches) come back as `Err`.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::StowResult;
use crate::value::{json_or_text, Blob};
use crate::version::VersionId;

/// Run a best-effort side effect, converting any fault into `false`
///
/// The fault is logged at `warn` with the operation name and never
/// propagated.
pub fn safe_run<T, E, F>(op: &str, f: F) -> bool
where
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    match f() {
        Ok(_) => true,
        Err(e) => {
            warn!(target: "stow::storage", op, error = %e, "Will return false - error happened");
            false
        }
    }
}

/// Like [`safe_run`] but keeps the produced value
pub fn safe_value<T, E, F>(op: &str, f: F) -> Option<T>
where
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    match f() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(target: "stow::storage", op, error = %e, "Will return nothing - error happened");
            None
        }
    }
}

/// Backend-agnostic key/value blob store
///
/// `Item` is the backend's handle over one stored value. Content is never
/// decoded by the store itself; callers use the `decode_*` helpers.
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Store: Send + Sync {
    /// Handle over one stored value
    type Item: Blob;

    /// Write raw bytes, overwriting any previous value
    ///
    /// `Ok(false)` when the backend failed or the bucket does not exist.
    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool>;

    /// Write UTF-8 text, overwriting any previous value
    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool>;

    /// Serialize `value` to JSON and write it as text
    fn write_json<T>(&self, bucket: &str, key: &str, value: &T) -> StowResult<bool>
    where
        Self: Sized,
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(value)?;
        self.write_text(bucket, key, &text)
    }

    /// Whether a value is stored under the key
    fn exists(&self, bucket: &str, key: &str) -> bool;

    /// Read the value under the key, `Ok(None)` if absent
    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<Self::Item>>;

    /// Lazily list every item whose key starts with `prefix`
    ///
    /// Single pass; call again to restart. Order is backend defined.
    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = Self::Item> + 'a>;

    /// Create a bucket; `false` if it already exists or creation failed
    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool;

    /// Delete a bucket and everything in it; `false` if it does not exist
    fn delete_bucket(&self, bucket: &str) -> bool;

    /// Delete one key; `false` if it does not exist
    fn delete(&self, bucket: &str, key: &str) -> bool;

    /// Key of an item
    fn key_of(&self, item: &Self::Item) -> String {
        item.key().to_string()
    }

    /// Item content as bytes
    fn decode_bytes(&self, item: &Self::Item) -> Vec<u8> {
        item.bytes().to_vec()
    }

    /// Item content as UTF-8 text
    fn decode_text(&self, item: &Self::Item) -> String {
        item.text().into_owned()
    }

    /// Item content as JSON, or the raw text as a JSON string if it does not parse
    fn decode_json(&self, item: &Self::Item) -> serde_json::Value {
        json_or_text(&item.text())
    }

    /// Item content as JSON, failing if it does not parse
    fn decode_json_strict(&self, item: &Self::Item) -> StowResult<serde_json::Value> {
        Ok(serde_json::from_slice(item.bytes())?)
    }

    /// Read and decode as bytes
    fn load_bytes(&self, bucket: &str, key: &str) -> StowResult<Option<Vec<u8>>> {
        Ok(self.read(bucket, key)?.map(|item| self.decode_bytes(&item)))
    }

    /// Read and decode as text
    fn load_text(&self, bucket: &str, key: &str) -> StowResult<Option<String>> {
        Ok(self.read(bucket, key)?.map(|item| self.decode_text(&item)))
    }

    /// Read and decode as JSON (text fallback)
    fn load_json(&self, bucket: &str, key: &str) -> StowResult<Option<serde_json::Value>> {
        Ok(self.read(bucket, key)?.map(|item| self.decode_json(&item)))
    }

    /// Contents under a prefix as text
    fn all_text<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = String> + 'a> {
        Box::new(self.list(bucket, prefix).map(move |item| self.decode_text(&item)))
    }

    /// `(key, text)` pairs under a prefix
    fn entries<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
    ) -> Box<dyn Iterator<Item = (String, String)> + 'a> {
        Box::new(
            self.list(bucket, prefix)
                .map(move |item| (self.key_of(&item), self.decode_text(&item))),
        )
    }

    /// Contents under a prefix as JSON (text fallback)
    fn all_json<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
    ) -> Box<dyn Iterator<Item = serde_json::Value> + 'a> {
        Box::new(self.list(bucket, prefix).map(move |item| self.decode_json(&item)))
    }

    /// `(key, JSON)` pairs under a prefix
    fn entries_json<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
    ) -> Box<dyn Iterator<Item = (String, serde_json::Value)> + 'a> {
        Box::new(
            self.list(bucket, prefix)
                .map(move |item| (self.key_of(&item), self.decode_json(&item))),
        )
    }
}

/// Store keeping an immutable, append-only history per key
///
/// Invariant: the content of `read(b, k)` equals
/// `data_at_version(b, k, versions(b, k).next())`.
pub trait VersionedStore: Store {
    /// All version ids of a key, most recent first
    fn versions<'a>(&'a self, bucket: &str, key: &str) -> Box<dyn Iterator<Item = VersionId> + 'a>;

    /// Value of a key at one version, `None` if unknown
    fn data_at_version(&self, bucket: &str, key: &str, version: &VersionId) -> Option<Self::Item>;

    /// Most recent version id, `None` if the key has no history
    fn latest_version(&self, bucket: &str, key: &str) -> Option<VersionId> {
        self.versions(bucket, key).next()
    }

    /// Page of version ids starting `offset` generations back from latest
    fn list_versions(&self, bucket: &str, key: &str, offset: usize, count: usize) -> Vec<VersionId> {
        self.versions(bucket, key).skip(offset).take(count).collect()
    }

    /// Value at a version decoded as text
    fn text_at_version(&self, bucket: &str, key: &str, version: &VersionId) -> Option<String> {
        self.data_at_version(bucket, key, version)
            .map(|item| self.decode_text(&item))
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    type Item = S::Item;

    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool> {
        (**self).write_bytes(bucket, key, data)
    }

    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool> {
        (**self).write_text(bucket, key, data)
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        (**self).exists(bucket, key)
    }

    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<Self::Item>> {
        (**self).read(bucket, key)
    }

    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = Self::Item> + 'a> {
        (**self).list(bucket, prefix)
    }

    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool {
        (**self).create_bucket(bucket, location, prevent_public_access)
    }

    fn delete_bucket(&self, bucket: &str) -> bool {
        (**self).delete_bucket(bucket)
    }

    fn delete(&self, bucket: &str, key: &str) -> bool {
        (**self).delete(bucket, key)
    }

    fn key_of(&self, item: &Self::Item) -> String {
        (**self).key_of(item)
    }

    fn decode_bytes(&self, item: &Self::Item) -> Vec<u8> {
        (**self).decode_bytes(item)
    }

    fn decode_text(&self, item: &Self::Item) -> String {
        (**self).decode_text(item)
    }

    fn decode_json(&self, item: &Self::Item) -> serde_json::Value {
        (**self).decode_json(item)
    }
}

impl<S: VersionedStore + ?Sized> VersionedStore for Arc<S> {
    fn versions<'a>(&'a self, bucket: &str, key: &str) -> Box<dyn Iterator<Item = VersionId> + 'a> {
        (**self).versions(bucket, key)
    }

    fn data_at_version(&self, bucket: &str, key: &str, version: &VersionId) -> Option<Self::Item> {
        (**self).data_at_version(bucket, key, version)
    }
}
