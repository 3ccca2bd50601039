//! Archive stager.
//!
//! Turns a downloaded archive into a version directory inside one root:
//! unpack into a throwaway staging directory, normalize the layout, then
//! move the result into `versions/<identifier>`. The staging directory
//! is removed on every exit path.
//!
//! Layout normalization: archives that wrap the bundle in a single
//! top-level folder (with no entry marker beside it) are flattened so
//! the entry marker lands directly under the version directory.

use std::fs;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::UpdateError;
use crate::storage;

/// Length of generated identifiers and staging tokens.
const TOKEN_LEN: usize = 10;

/// Opaque unpack capability. Failure means a corrupt or unsupported
/// archive; implementations must not leave anything under `versions/`.
pub trait Unpack {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), UpdateError>;
}

/// Default unpacker for gzipped tar bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzUnpack;

impl Unpack for TarGzUnpack {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), UpdateError> {
        let unpack_failed = || UpdateError::UnpackFailed {
            path: archive.to_path_buf(),
        };
        let file = fs::File::open(archive).map_err(|e| {
            warn!("cannot open archive {}: {}", archive.display(), e);
            unpack_failed()
        })?;
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.unpack(dest).map_err(|e| {
            warn!("cannot unpack {}: {}", archive.display(), e);
            unpack_failed()
        })
    }
}

/// Collision-resistant token for version identifiers and staging names.
pub fn random_identifier() -> String {
    rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Removes the staging directory when the stage operation returns,
/// whatever the outcome. After a whole-directory promote the path is
/// already gone and there is nothing to do.
struct StagingGuard {
    path: PathBuf,
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            storage::remove_tree(&self.path);
        }
    }
}

/// Unpack `archive` and install it as `versions/<identifier>` under
/// `root`. `staging_parent` hosts the throwaway staging directory.
pub fn stage_into_root(
    unpacker: &dyn Unpack,
    archive: &Path,
    staging_parent: &Path,
    root: &Path,
    identifier: &str,
) -> Result<(), UpdateError> {
    storage::ensure_root(root);

    let staging = staging_parent.join(format!("staging-{}", random_identifier()));
    let _guard = StagingGuard {
        path: staging.clone(),
    };
    fs::create_dir_all(&staging).map_err(|e| UpdateError::InstallFailed {
        dest: staging.clone(),
        source: e,
    })?;

    unpacker.unpack(archive, &staging)?;
    promote(&staging, &storage::version_path(root, identifier))
}

/// Move the staged tree into place, flattening a single wrapper folder.
fn promote(staging: &Path, dest: &Path) -> Result<(), UpdateError> {
    let install_failed = |e| UpdateError::InstallFailed {
        dest: dest.to_path_buf(),
        source: e,
    };

    let entries: Vec<PathBuf> = fs::read_dir(staging)
        .map_err(install_failed)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();

    let has_marker = staging.join(storage::ENTRY_MARKER).is_file();
    let source = match entries.as_slice() {
        [single] if single.is_dir() && !has_marker => {
            debug!("flattening wrapper folder {}", single.display());
            single.clone()
        }
        _ => staging.to_path_buf(),
    };

    fs::rename(&source, dest).map_err(install_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn write_archive(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("bundle.tar.gz");
        let file = fs::File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn identifiers_are_ten_char_alphanumeric() {
        let id = random_identifier();
        assert_eq!(id.len(), TOKEN_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, random_identifier());
    }

    #[test]
    fn flat_archive_installs_as_is() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let archive = write_archive(
            temp.path(),
            &[("index.html", "<html></html>"), ("app.js", "void 0")],
        );

        stage_into_root(&TarGzUnpack, &archive, temp.path(), &root, "abc123").unwrap();

        let dest = storage::version_path(&root, "abc123");
        assert!(dest.join("index.html").is_file());
        assert!(dest.join("app.js").is_file());
    }

    #[test]
    fn wrapper_folder_is_flattened() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let archive = write_archive(
            temp.path(),
            &[("build/index.html", "<html></html>"), ("build/app.js", "void 0")],
        );

        stage_into_root(&TarGzUnpack, &archive, temp.path(), &root, "wrapped").unwrap();

        let dest = storage::version_path(&root, "wrapped");
        assert!(dest.join("index.html").is_file());
        assert!(!dest.join("build").exists());
    }

    #[test]
    fn single_dir_with_sibling_marker_is_not_flattened() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let archive = write_archive(
            temp.path(),
            &[("index.html", "<html></html>"), ("assets/app.js", "void 0")],
        );

        stage_into_root(&TarGzUnpack, &archive, temp.path(), &root, "sibling").unwrap();

        let dest = storage::version_path(&root, "sibling");
        assert!(dest.join("index.html").is_file());
        assert!(dest.join("assets").join("app.js").is_file());
    }

    #[test]
    fn corrupt_archive_fails_without_partial_state() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let archive = temp.path().join("broken.tar.gz");
        fs::write(&archive, b"this is not a gzip stream").unwrap();

        let err = stage_into_root(&TarGzUnpack, &archive, temp.path(), &root, "bad")
            .unwrap_err();
        assert!(matches!(err, UpdateError::UnpackFailed { .. }));

        assert!(!storage::version_path(&root, "bad").exists());
        assert!(storage::list_versions(&root).is_empty());
    }

    #[test]
    fn staging_directory_is_always_cleaned_up() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let staging_parent = temp.path().join("staging-area");
        fs::create_dir_all(&staging_parent).unwrap();

        let good = write_archive(temp.path(), &[("index.html", "x")]);
        stage_into_root(&TarGzUnpack, &good, &staging_parent, &root, "ok").unwrap();

        let bad = temp.path().join("bad.tar.gz");
        fs::write(&bad, b"garbage").unwrap();
        let _ = stage_into_root(&TarGzUnpack, &bad, &staging_parent, &root, "nope");

        let leftovers: Vec<_> = fs::read_dir(&staging_parent).unwrap().collect();
        assert!(leftovers.is_empty());
    }
}
