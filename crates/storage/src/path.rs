//! Mapping of bucket and key names onto the filesystem
//!
//! Keys are `/`-separated relative paths. Anything that would resolve
//! outside its bucket (absolute paths, `.` or `..` segments, empty
//! segments) is rejected, and the operation is treated like any other
//! best-effort failure by the caller.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Join a `/`-separated relative key onto `base`
pub(crate) fn join_key(base: &Path, key: &str) -> Option<PathBuf> {
    if key.is_empty() {
        return None;
    }
    let mut path = base.to_path_buf();
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

/// Path of a bucket directory under the mount root
pub(crate) fn bucket_dir(root: &Path, bucket: &str) -> Option<PathBuf> {
    if bucket.contains('/') {
        return None;
    }
    join_key(root, bucket)
}

/// Relative `/`-separated key of `path` under `root`
pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// Lazy depth-first walk over the part of a bucket a key prefix can match
///
/// Only the directory named by the prefix up to its last `/` is visited.
/// Entries come out in ascending file-name order per directory; the open
/// directory handles are owned by the iterator and closed when it is
/// dropped.
pub(crate) struct PrefixWalk {
    bucket_root: PathBuf,
    prefix: String,
    prune: Option<&'static str>,
}

impl PrefixWalk {
    pub(crate) fn new(bucket_root: PathBuf, prefix: &str) -> Self {
        Self {
            bucket_root,
            prefix: prefix.to_string(),
            prune: None,
        }
    }

    /// Never descend into directories with this name
    pub(crate) fn prune(mut self, dir_name: &'static str) -> Self {
        self.prune = Some(dir_name);
        self
    }

    /// `(relative key, entry)` for every entry below the start directory
    ///
    /// Prefix matching is left to the caller, since a versioned store
    /// matches on the key directory rather than on the entry path.
    pub(crate) fn entries(self) -> Box<dyn Iterator<Item = (String, walkdir::DirEntry)>> {
        let start = match self.prefix.rfind('/') {
            Some(idx) => match join_key(&self.bucket_root, &self.prefix[..idx]) {
                Some(dir) => dir,
                None => return Box::new(std::iter::empty()),
            },
            None => self.bucket_root.clone(),
        };
        if !start.is_dir() {
            return Box::new(std::iter::empty());
        }

        let prune = self.prune;
        let root = self.bucket_root;
        let walker = WalkDir::new(start)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| match prune {
                Some(name) => !(e.file_type().is_dir() && e.file_name() == name),
                None => true,
            })
            .filter_map(|res| match res {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(target: "stow::storage", error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter_map(move |entry| relative_key(&root, entry.path()).map(|key| (key, entry)));
        Box::new(walker)
    }
}
