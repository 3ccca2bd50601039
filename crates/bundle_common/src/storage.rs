//! Storage root pair primitives.
//!
//! Both roots hold a `versions/` collection keyed by identifier. A
//! version directory is valid only when it is a directory with the
//! entry marker at its top level; the dual-root completeness check in
//! the activation gate builds on the per-root check here.
//!
//! Cleanup failures are logged and reported as booleans, never raised:
//! a stale directory must not block the rest of the lifecycle.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Name of the per-root version collection.
pub const VERSIONS_DIR: &str = "versions";

/// File whose top-level presence marks a servable bundle.
pub const ENTRY_MARKER: &str = "index.html";

/// `<root>/versions`
pub fn versions_dir(root: &Path) -> PathBuf {
    root.join(VERSIONS_DIR)
}

/// `<root>/versions/<identifier>`
pub fn version_path(root: &Path, identifier: &str) -> PathBuf {
    versions_dir(root).join(identifier)
}

/// Create the root's version collection if absent. Idempotent; failure
/// is logged and left for the install step to surface.
pub fn ensure_root(root: &Path) {
    let dir = versions_dir(root);
    if let Err(e) = fs::create_dir_all(&dir) {
        warn!("cannot create {}: {}", dir.display(), e);
    }
}

/// Best-effort recursive delete. Returns false (and logs) on failure.
pub fn remove_tree(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("{} not removed: {}", path.display(), e);
            false
        }
    }
}

/// Per-root validity: exists, is a directory, entry marker at top level.
pub fn is_valid_version_dir(root: &Path, identifier: &str) -> bool {
    let dir = version_path(root, identifier);
    dir.is_dir() && dir.join(ENTRY_MARKER).is_file()
}

/// Identifiers currently stored under the root. Empty when the
/// collection is missing or unreadable, never an error.
pub fn list_versions(root: &Path) -> Vec<String> {
    let dir = versions_dir(root);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("no versions under {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect()
}
