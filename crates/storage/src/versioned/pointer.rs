//! The `__latest__` pointer of a versioned key
//!
//! On unix the pointer is a relative symbolic link `__ver__/<version-id>`.
//! Elsewhere it is a regular file holding the version id. In both cases a
//! new pointer is created under a temporary name and renamed over the old
//! one, so readers see either the previous or the next version and a crash
//! never leaves the key without a pointer.

use std::fs;
use std::io;
use std::path::Path;

use stow_core::VersionId;

/// Directory holding one write-once file per version
pub const VERSION_DIR: &str = "__ver__";

/// Name of the pointer to the current version
pub const LATEST: &str = "__latest__";

/// Point `key_dir/__latest__` at `version`
pub(crate) fn swap(key_dir: &Path, version: &VersionId) -> io::Result<()> {
    let staged = key_dir.join(format!("{}.{}.tmp", LATEST, version));
    let _ = fs::remove_file(&staged);
    create(&staged, version)?;
    let renamed = fs::rename(&staged, key_dir.join(LATEST));
    if renamed.is_err() {
        let _ = fs::remove_file(&staged);
    }
    renamed
}

#[cfg(unix)]
fn create(at: &Path, version: &VersionId) -> io::Result<()> {
    let target = Path::new(VERSION_DIR).join(version.as_str());
    std::os::unix::fs::symlink(target, at)
}

#[cfg(not(unix))]
fn create(at: &Path, version: &VersionId) -> io::Result<()> {
    fs::write(at, version.as_str())
}

/// Version currently referenced by `key_dir/__latest__`
///
/// Absolute link targets written by older layouts resolve the same way,
/// since only the final path component is used.
#[cfg(unix)]
pub(crate) fn current(key_dir: &Path) -> io::Result<VersionId> {
    let target = fs::read_link(key_dir.join(LATEST))?;
    target
        .file_name()
        .and_then(|n| n.to_str())
        .map(VersionId::new)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed latest pointer"))
}

#[cfg(not(unix))]
pub(crate) fn current(key_dir: &Path) -> io::Result<VersionId> {
    let id = fs::read_to_string(key_dir.join(LATEST))?;
    Ok(VersionId::new(id.trim()))
}

/// True for ids that are safe to use as a file name inside `__ver__`
pub(crate) fn is_valid_id(version: &VersionId) -> bool {
    let s = version.as_str();
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}
