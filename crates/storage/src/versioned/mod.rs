//! Versioned backends
//!
//! - `VersionedFileStore`: history on disk with an atomically swapped pointer
//! - `VersionedMemoryStore`: history in memory, built on `VersionedMap`

mod fs;
mod map;
mod memory;
pub(crate) mod pointer;

pub use fs::VersionedFileStore;
pub use map::VersionedMap;
pub use memory::VersionedMemoryStore;
pub use pointer::{LATEST, VERSION_DIR};
