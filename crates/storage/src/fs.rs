//! FileStore: durable backend over a local directory tree
//!
//! Layout: `<mount>/<bucket>/<key>` holds the value verbatim. Buckets are
//! the immediate subdirectories of the mount root; keys may contain `/`,
//! in which case parent directories are created on demand.
//!
//! A write stages the value in a hidden sibling file ending in
//! [`STAGING_SUFFIX`] and renames it over the key, so readers see either
//! the old or the new value. Keys with a segment ending in that suffix are
//! rejected and staged files never appear in listings.
//!
//! Every operation is best-effort: I/O faults are logged and reported as
//! `false` / `None` / an empty listing (see [`stow_core::safe_run`]).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use stow_core::{safe_run, safe_value, Entry, Store, StowResult};
use tracing::{debug, info};

use crate::path::{bucket_dir, join_key, PrefixWalk};

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `mount_point`, creating the directory if needed
    ///
    /// The mount point is canonicalised so that every bucket path is absolute.
    pub fn open(mount_point: impl AsRef<Path>) -> StowResult<Self> {
        let mount_point = mount_point.as_ref();
        fs::create_dir_all(mount_point)?;
        let root = mount_point.canonicalize()?;
        info!(target: "stow::storage", mount_point = %mount_point.display(), root = %root.display(), "Opened file store");
        Ok(Self { root })
    }

    /// Absolute mount root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a bucket, `None` for an invalid bucket name
    pub fn bucket_path(&self, bucket: &str) -> Option<PathBuf> {
        bucket_dir(&self.root, bucket)
    }

    /// Path a key maps to, `None` for invalid names
    pub fn key_path(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        if key.split('/').any(is_staging_name) {
            return None;
        }
        join_key(&self.bucket_path(bucket)?, key)
    }

    /// Whether the bucket directory exists
    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.bucket_path(bucket).map_or(false, |p| p.is_dir())
    }
}

/// Remove a file or a whole directory tree
///
/// Returns true only if the path is gone afterwards.
pub fn delete_recursive(path: &Path) -> bool {
    let removed = safe_run("delete", || -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    });
    removed && fs::symlink_metadata(path).is_err()
}

/// File name suffix of values staged for a rename
pub const STAGING_SUFFIX: &str = ".stow-tmp";

static STAGING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn is_staging_name(name: &str) -> bool {
    name.ends_with(STAGING_SUFFIX)
}

/// Write `data` to `path` atomically (temp + fsync + rename)
///
/// Parent directories are created on demand. The staged file is removed
/// if any step fails.
pub(crate) fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = dir.join(format!(
        ".{}.{}.{}{}",
        name,
        std::process::id(),
        STAGING_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        STAGING_SUFFIX
    ));

    let staged = (|| -> io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();
    if staged.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    staged
}

impl Store for FileStore {
    type Item = Entry;

    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool> {
        if !self.bucket_exists(bucket) {
            debug!(target: "stow::storage", bucket, key, "Write to missing bucket");
            return Ok(false);
        }
        let Some(path) = self.key_path(bucket, key) else {
            debug!(target: "stow::storage", bucket, key, "Rejected key");
            return Ok(false);
        };
        Ok(safe_run("write", || write_file(&path, data)))
    }

    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool> {
        self.write_bytes(bucket, key, data.as_bytes())
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        self.key_path(bucket, key).map_or(false, |p| p.is_file())
    }

    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<Entry>> {
        let Some(path) = self.key_path(bucket, key) else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        Ok(safe_value("read", || fs::read(&path)).map(|data| Entry::new(key, data)))
    }

    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = Entry> + 'a> {
        let Some(root) = self.bucket_path(bucket) else {
            return Box::new(std::iter::empty());
        };
        let prefix = prefix.to_string();
        Box::new(
            PrefixWalk::new(root, &prefix)
                .entries()
                .filter(move |(key, entry)| {
                    entry.file_type().is_file()
                        && key.starts_with(&prefix)
                        && !entry.file_name().to_str().map_or(true, is_staging_name)
                })
                .filter_map(|(key, entry)| {
                    safe_value("read", || fs::read(entry.path())).map(|data| Entry::new(key, data))
                }),
        )
    }

    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool {
        let Some(path) = self.bucket_path(bucket) else {
            return false;
        };
        if path.exists() {
            return false;
        }
        debug!(target: "stow::storage", bucket, location, prevent_public_access, "Creating bucket");
        safe_run("create bucket", || fs::create_dir_all(&path))
    }

    fn delete_bucket(&self, bucket: &str) -> bool {
        match self.bucket_path(bucket) {
            Some(path) if path.exists() => delete_recursive(&path),
            _ => false,
        }
    }

    fn delete(&self, bucket: &str, key: &str) -> bool {
        match self.key_path(bucket, key) {
            Some(path) if path.exists() => delete_recursive(&path),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_mount_point() {
        let dir = TempDir::new().unwrap();
        let mount = dir.path().join("nested/mount");
        let store = FileStore::open(&mount).unwrap();
        assert!(store.root().is_absolute());
        assert!(mount.is_dir());
    }

    #[test]
    fn test_write_to_missing_bucket_is_false() {
        let (_dir, store) = store();
        assert!(!store.write_text("nope", "k", "v").unwrap());
        assert!(!store.exists("nope", "k"));
    }

    #[test]
    fn test_nested_key_creates_directories() {
        let (_dir, store) = store();
        assert!(store.create_bucket("b", "", false));
        assert!(store.write_text("b", "a/b/c", "deep").unwrap());
        assert!(store.root().join("b/a/b/c").is_file());
        assert_eq!(store.load_text("b", "a/b/c").unwrap().as_deref(), Some("deep"));
    }

    #[test]
    fn test_escaping_keys_are_rejected() {
        let (_dir, store) = store();
        assert!(store.create_bucket("b", "", false));
        assert!(!store.write_text("b", "../escape", "x").unwrap());
        assert!(store.read("b", "../escape").unwrap().is_none());
        assert!(!store.delete("b", "../escape"));
    }

    #[test]
    fn test_directory_is_not_a_key() {
        let (_dir, store) = store();
        assert!(store.create_bucket("b", "", false));
        assert!(store.write_text("b", "dir/file", "x").unwrap());
        assert!(!store.exists("b", "dir"));
        assert!(store.read("b", "dir").unwrap().is_none());
    }

    #[test]
    fn test_list_filters_on_partial_segment() {
        let (_dir, store) = store();
        assert!(store.create_bucket("b", "", false));
        for key in ["log/10", "log/11", "log/20", "other"] {
            assert!(store.write_text("b", key, key).unwrap());
        }
        let keys: Vec<String> = store.list("b", "log/1").map(|e| e.key().to_string()).collect();
        assert_eq!(keys, vec!["log/10", "log/11"]);
        assert_eq!(store.list("b", "").count(), 4);
        assert_eq!(store.list("b", "missing/").count(), 0);
        assert_eq!(store.list("nope", "").count(), 0);
    }

    #[test]
    fn test_write_leaves_no_staged_file() {
        let (_dir, store) = store();
        assert!(store.create_bucket("b", "", false));
        assert!(store.write_text("b", "k", "one").unwrap());
        assert!(store.write_text("b", "k", "two").unwrap());
        let names: Vec<String> = fs::read_dir(store.root().join("b"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k"]);
        assert_eq!(store.load_text("b", "k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_staged_files_are_not_keys() {
        let (_dir, store) = store();
        assert!(store.create_bucket("b", "", false));
        fs::write(store.root().join("b").join(format!(".k.1.0{}", STAGING_SUFFIX)), "half").unwrap();
        assert!(store.write_text("b", "k", "v").unwrap());
        let keys: Vec<String> = store.list("b", "").map(|e| e.key().to_string()).collect();
        assert_eq!(keys, vec!["k"]);
        assert!(!store.write_text("b", &format!("x{}", STAGING_SUFFIX), "v").unwrap());
    }

    #[test]
    fn test_reader_never_sees_torn_value() {
        let (_dir, store) = store();
        assert!(store.create_bucket("b", "", false));
        let old = vec![b'a'; 1 << 20];
        let new = vec![b'b'; 1 << 20];
        assert!(store.write_bytes("b", "k", &old).unwrap());

        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                for i in 0..20 {
                    let data = if i % 2 == 0 { &new } else { &old };
                    assert!(store.write_bytes("b", "k", data).unwrap());
                }
            });
            while !writer.is_finished() {
                let read = store.load_bytes("b", "k").unwrap().unwrap();
                assert!(read == old || read == new, "torn read of {} bytes", read.len());
            }
        });
    }

    #[test]
    fn test_delete_recursive_on_missing_path() {
        let (dir, _store) = store();
        assert!(!delete_recursive(&dir.path().join("not-there")));
    }
}
