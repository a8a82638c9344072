//! Stow - pluggable versioned blob storage
//!
//! Stow keeps bytes, text and JSON in buckets behind one [`Store`] contract,
//! with interchangeable backends and layers on top:
//! - filesystem and in-memory backends, plain or versioned
//! - a time-bucketed log with range queries
//! - an append-log queue with offset-based paging
//! - a decorator validating writes against JSON schemas
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use stow::{MemoryStore, Store, TimeSeriesExt};
//!
//! let store = Arc::new(MemoryStore::new());
//! store.create_bucket("events", "", false);
//! store.write_text("events", "greeting", "hello")?;
//!
//! let log = store.time_series("events", "app", "SEC")?;
//! log.append("json", serde_json::json!({"n": 1}))?;
//! ```
//!
//! # Configuration
//!
//! [`StowConfig`] reads `stow.toml` and opens the configured backend as an
//! [`AnyStore`].

mod config;
mod logging;

pub use config::{StowConfig, CONFIG_FILE_NAME};
pub use logging::init_tracing;

pub use stow_core::{
    safe_run, safe_value, Blob, Entry, Payload, Store, StowError, StowResult, VersionClock,
    VersionId, VersionedStore,
};
pub use stow_primitives::{
    directory_prefix, BroadcastLog, PathRule, Precision, QueuePage, Record, SchemaDirectory, SchemaRegistry,
    TimeSeriesExt, TimeSeriesLog, TypeChecker, TypedConfig, TypedStore,
};
pub use stow_storage::{
    AnyStore, BackendKind, FileStore, KeyLocks, MemoryStore, StorageConfig, VersionedFileStore,
    VersionedMap, VersionedMemoryStore,
};
