//! Storage backends for stow
//!
//! This crate implements the concrete [`Store`](stow_core::Store) backends:
//! - FileStore: one file per key under `<mount>/<bucket>/`
//! - MemoryStore: DashMap of sorted buckets, for tests and simulation
//! - VersionedFileStore: per-key history with an atomically swapped pointer
//! - VersionedMemoryStore: per-key history in a [`VersionedMap`]
//! - KeyLocks: per-key mutual exclusion for the versioned write path
//! - StorageConfig / AnyStore: pick a backend from configuration
//!
//! # Fault model
//!
//! Backends never return I/O errors. A failed write is `Ok(false)`, a
//! failed read is `Ok(None)`, a failed listing is empty; the cause is
//! logged under the `stow::storage` or `stow::versioned` target.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod any;
pub mod config;
pub mod fs;
pub mod lock;
pub mod memory;
mod path;
pub mod versioned;

pub use any::AnyStore;
pub use config::{BackendKind, StorageConfig};
pub use fs::{delete_recursive, FileStore};
pub use lock::KeyLocks;
pub use memory::MemoryStore;
pub use versioned::{VersionedFileStore, VersionedMap, VersionedMemoryStore};
