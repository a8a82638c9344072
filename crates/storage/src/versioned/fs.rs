//! VersionedFileStore: journaled filesystem backend
//!
//! Layout per key:
//!
//! ```text
//! <mount>/<bucket>/<key>/__ver__/<version-id>   one write-once file per version
//! <mount>/<bucket>/<key>/__latest__             pointer to the current version
//! ```
//!
//! ## Write protocol
//!
//! 1. take the per-key lock
//! 2. ensure `__ver__` exists
//! 3. issue a fresh [`VersionId`] from the process-wide [`VersionClock`]
//! 4. write the version file
//! 5. swap the pointer (stage + rename, see [`super::pointer`])
//!
//! Version files are created exclusively, so an id collision between two
//! processes sharing a mount fails the write instead of replacing history.
//! If the pointer swap fails the new version file is removed again.
//!
//! Writes to one key are mutually exclusive; writes to different keys run
//! in parallel. A crash after step 4 leaves an orphan version file that
//! `versions()` reports but the pointer does not reference. Callers
//! needing stronger guarantees across keys must add their own journal.
//!
//! History is never pruned.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use stow_core::{
    safe_run, safe_value, Entry, Store, StowResult, VersionClock, VersionId, VersionedStore,
};
use tracing::{debug, info};

use super::pointer::{self, LATEST, VERSION_DIR};
use crate::fs::{delete_recursive, FileStore};
use crate::lock::KeyLocks;
use crate::path::PrefixWalk;

/// Filesystem store keeping every version of every key
#[derive(Debug)]
pub struct VersionedFileStore {
    files: FileStore,
    locks: KeyLocks,
}

impl VersionedFileStore {
    /// Open a versioned store rooted at `mount_point`
    pub fn open(mount_point: impl AsRef<Path>) -> StowResult<Self> {
        let files = FileStore::open(mount_point)?;
        info!(target: "stow::versioned", root = %files.root().display(), "Opened versioned file store");
        Ok(Self {
            files,
            locks: KeyLocks::new(),
        })
    }

    /// Absolute mount root
    pub fn root(&self) -> &Path {
        self.files.root()
    }

    /// Directory holding a key's history and pointer
    ///
    /// Keys with a reserved segment would collide with another key's layout.
    fn key_dir(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        if key.split('/').any(|s| s == VERSION_DIR || s == LATEST) {
            return None;
        }
        self.files.key_path(bucket, key)
    }

    fn read_version(&self, key_dir: &Path, version: &VersionId) -> Option<Vec<u8>> {
        if !pointer::is_valid_id(version) {
            return None;
        }
        let path = key_dir.join(VERSION_DIR).join(version.as_str());
        if !path.is_file() {
            return None;
        }
        safe_value("read version", || fs::read(&path))
    }

    fn read_latest(&self, key_dir: &Path) -> Option<Vec<u8>> {
        let version = pointer::current(key_dir).ok()?;
        self.read_version(key_dir, &version)
    }
}

/// Create a version file that must not exist yet
fn write_version(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(data).and_then(|()| file.sync_all());
    if written.is_err() {
        let _ = fs::remove_file(path);
    }
    written
}

impl Store for VersionedFileStore {
    type Item = Entry;

    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool> {
        if !self.files.bucket_exists(bucket) {
            debug!(target: "stow::versioned", bucket, key, "Write to missing bucket");
            return Ok(false);
        }
        let Some(key_dir) = self.key_dir(bucket, key) else {
            return Ok(false);
        };
        let lock_key = format!("{}/{}", bucket, key);
        let written = self.locks.with_lock(&lock_key, || {
            safe_run("versioned write", || -> io::Result<()> {
                let ver_dir = key_dir.join(VERSION_DIR);
                fs::create_dir_all(&ver_dir)?;
                let version = VersionClock::global().next_id();
                let version_path = ver_dir.join(version.as_str());
                write_version(&version_path, data)?;
                if let Err(e) = pointer::swap(&key_dir, &version) {
                    let _ = fs::remove_file(&version_path);
                    return Err(e);
                }
                debug!(target: "stow::versioned", bucket, key, %version, "Latest pointer swapped");
                Ok(())
            })
        });
        Ok(written)
    }

    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool> {
        self.write_bytes(bucket, key, data.as_bytes())
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        self.key_dir(bucket, key)
            .map_or(false, |dir| pointer::current(&dir).is_ok())
    }

    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<Entry>> {
        Ok(self
            .key_dir(bucket, key)
            .and_then(|dir| self.read_latest(&dir))
            .map(|data| Entry::new(key, data)))
    }

    /// One entry per key with a live pointer; `__ver__` trees are never entered
    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = Entry> + 'a> {
        let Some(root) = self.files.bucket_path(bucket) else {
            return Box::new(std::iter::empty());
        };
        let prefix = prefix.to_string();
        let walk = PrefixWalk::new(root, &prefix).prune(VERSION_DIR).entries();
        Box::new(walk.filter_map(move |(rel, entry)| {
            if entry.file_name() != LATEST || entry.file_type().is_dir() {
                return None;
            }
            let key = rel.strip_suffix(LATEST)?.strip_suffix('/')?;
            if !key.starts_with(&prefix) {
                return None;
            }
            let key_dir = entry.path().parent()?;
            self.read_latest(key_dir).map(|data| Entry::new(key, data))
        }))
    }

    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool {
        self.files.create_bucket(bucket, location, prevent_public_access)
    }

    fn delete_bucket(&self, bucket: &str) -> bool {
        self.files.delete_bucket(bucket)
    }

    /// Drops the key's whole history; keys nested below it survive
    fn delete(&self, bucket: &str, key: &str) -> bool {
        let Some(key_dir) = self.key_dir(bucket, key) else {
            return false;
        };
        if pointer::current(&key_dir).is_err() {
            return false;
        }
        let lock_key = format!("{}/{}", bucket, key);
        self.locks.with_lock(&lock_key, || {
            let removed = delete_recursive(&key_dir.join(LATEST))
                && delete_recursive(&key_dir.join(VERSION_DIR));
            // Fails harmlessly while nested keys remain
            let _ = fs::remove_dir(&key_dir);
            removed
        })
    }
}

impl VersionedStore for VersionedFileStore {
    fn versions<'a>(&'a self, bucket: &str, key: &str) -> Box<dyn Iterator<Item = VersionId> + 'a> {
        let Some(key_dir) = self.key_dir(bucket, key) else {
            return Box::new(std::iter::empty());
        };
        let ver_dir = key_dir.join(VERSION_DIR);
        let mut ids: Vec<String> = safe_value("list versions", || fs::read_dir(&ver_dir))
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Box::new(ids.into_iter().map(VersionId::new))
    }

    fn data_at_version(&self, bucket: &str, key: &str, version: &VersionId) -> Option<Entry> {
        let key_dir = self.key_dir(bucket, key)?;
        self.read_version(&key_dir, version)
            .map(|data| Entry::new(key, data))
    }
}
