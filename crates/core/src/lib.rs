//! Core types and traits for stow
//!
//! This crate defines the contracts every backend and layer builds on:
//! - Store: key/value blob contract with lazy decode helpers
//! - VersionedStore: per-key immutable history with a latest pointer
//! - Blob / Entry / Payload: item handles and raw content
//! - VersionId / VersionClock: opaque, sortable version identifiers
//! - StowError: error type for contract violations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod value;
pub mod version;

pub use error::{StowError, StowResult};
pub use traits::{safe_run, safe_value, Store, VersionedStore};
pub use value::{json_or_text, Blob, Entry, Payload};
pub use version::{decode_base62, encode_base62, VersionClock, VersionId, VERSION_ID_WIDTH};
