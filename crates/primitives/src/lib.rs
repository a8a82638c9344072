//! Layers built on top of any stow [`Store`](stow_core::Store)
//!
//! - **TimeSeriesLog**: time-bucketed append log with range queries
//! - **BroadcastLog**: append-log queue with offset-based paging
//! - **TypedStore**: decorator validating bodies against JSON schemas
//!
//! ## Design Principle: Stateless Layers
//!
//! Each layer holds only its backend (shared through `Arc` or owned) and
//! some configuration. All state lives in the store, so several layers over
//! the same store see each other's writes and can be dropped and recreated
//! freely.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod broadcast;
pub mod time_series;
pub mod typed;

pub use broadcast::{
    directory_prefix, BroadcastLog, QueuePage, DEFAULT_NODE_ID, TIME_BUCKET_FORMAT,
};
pub use time_series::{Precision, Record, Step, TimeSeriesExt, TimeSeriesLog};
pub use typed::{PathRule, SchemaDirectory, SchemaRegistry, TypeChecker, TypedConfig, TypedStore};
