//! Backend selection
//!
//! The `[storage]` section of `stow.toml` maps onto [`StorageConfig`]:
//!
//! ```toml
//! [storage]
//! backend = "file"        # "file" | "memory"
//! mount_point = "./data"  # file backend only
//! versioned = false
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stow_core::StowResult;
use tracing::info;

use crate::any::AnyStore;
use crate::fs::FileStore;
use crate::memory::MemoryStore;
use crate::versioned::{VersionedFileStore, VersionedMemoryStore};

/// Which backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local directory tree
    #[default]
    File,
    /// Process memory
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind
    #[serde(default)]
    pub backend: BackendKind,
    /// Mount root for the file backend
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,
    /// Keep every version of every key
    #[serde(default)]
    pub versioned: bool,
}

fn default_mount_point() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            mount_point: default_mount_point(),
            versioned: false,
        }
    }
}

impl StorageConfig {
    /// In-memory backend
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }

    /// File backend mounted at `mount_point`
    pub fn file(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::File,
            mount_point: mount_point.into(),
            versioned: false,
        }
    }

    /// Same backend, keeping history
    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    /// Open the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if the file backend's mount point cannot be created.
    pub fn open(&self) -> StowResult<AnyStore> {
        info!(target: "stow::storage", backend = ?self.backend, versioned = self.versioned, "Opening store");
        Ok(match (self.backend, self.versioned) {
            (BackendKind::File, false) => AnyStore::File(FileStore::open(&self.mount_point)?),
            (BackendKind::File, true) => {
                AnyStore::VersionedFile(VersionedFileStore::open(&self.mount_point)?)
            }
            (BackendKind::Memory, false) => AnyStore::Memory(MemoryStore::new()),
            (BackendKind::Memory, true) => AnyStore::VersionedMemory(VersionedMemoryStore::new()),
        })
    }
}
