//! Version lifecycle manager.
//!
//! `BundleUpdater` owns the configuration, the persisted activation
//! pointer, and the unpack capability, and exposes the whole lifecycle
//! surface: check, download, list, activate, delete, reset, and the
//! active-path getters.
//!
//! Concurrency contract: one logical caller at a time per identifier.
//! Different identifiers never share paths and are safe to work on
//! concurrently; serializing operations on the same identifier is the
//! caller's job.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{UpdaterConfig, DEFAULT_VERSION_NAME};
use crate::error::UpdateError;
use crate::pointer::{ActivePointer, JsonPointerStore, PointerStore};
use crate::stager::{self, TarGzUnpack, Unpack};
use crate::stats::{self, StatsAction};
use crate::storage;
use crate::transport::{self, LatestVersion};

/// Progress callback, invoked from a background thread with values in
/// 0..=100. May fire on a non-main thread; must not block.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// File under the durable root holding the activation pointer.
const POINTER_FILE: &str = "active.json";

pub struct BundleUpdater {
    config: UpdaterConfig,
    store: Box<dyn PointerStore>,
    unpacker: Box<dyn Unpack>,
    notify_download: ProgressCallback,
}

impl BundleUpdater {
    /// Build with the default JSON pointer store (kept under the durable
    /// root so activation state survives loss of the primary root) and
    /// the tar.gz unpacker.
    pub fn new(config: UpdaterConfig) -> Self {
        let store = JsonPointerStore::new(config.durable_root.join(POINTER_FILE));
        Self {
            config,
            store: Box::new(store),
            unpacker: Box::new(TarGzUnpack),
            notify_download: Arc::new(|_| {}),
        }
    }

    /// Swap the pointer persistence backend.
    pub fn with_store(mut self, store: impl PointerStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Swap the unpack capability.
    pub fn with_unpacker(mut self, unpacker: impl Unpack + 'static) -> Self {
        self.unpacker = Box::new(unpacker);
        self
    }

    /// Register a progress observer for `download`.
    pub fn on_progress(&mut self, notify: impl Fn(u8) + Send + Sync + 'static) {
        self.notify_download = Arc::new(notify);
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Ask the configured endpoint for the latest bundle descriptor.
    /// Any failure degrades to None; checking must never break callers.
    pub fn check_for_update(&self) -> Option<LatestVersion> {
        self.check_for_update_at(&self.config.update_url)
    }

    /// Version check against an explicit endpoint.
    pub fn check_for_update_at(&self, endpoint: &str) -> Option<LatestVersion> {
        transport::check_latest(&self.config, endpoint, &self.reported_version_name())
    }

    /// Fetch `url` and install it into both roots under a fresh
    /// identifier. Blocks until the whole fetch+install completes.
    ///
    /// Progress over a successful call: 0, transfer values in 10..=70,
    /// 71 after the fetch, 85 after the primary install, 100 after the
    /// durable install. Returns the new identifier, or exactly one
    /// terminal error after best-effort cleanup.
    pub fn download(&self, url: &str) -> Result<String, UpdateError> {
        self.notify(0);
        let archive = transport::download_to_temp(&self.config, url, self.notify_download.clone())?;
        self.notify(71);

        let staged = self.install_from_archive(&archive);
        if let Err(e) = fs::remove_file(&archive) {
            warn!("temp archive {} not removed: {}", archive.display(), e);
        }
        staged
    }

    /// Install a local archive into both roots under a fresh identifier.
    ///
    /// This is the tail of `download` (notifies 85 and 100) and also
    /// serves sideloading a bundle that was fetched out of band. The
    /// roots are staged best-effort: a failure in the durable root does
    /// not roll back the primary root — the activation gate is what
    /// keeps a half-installed version from ever going live.
    pub fn install_from_archive(&self, archive: &Path) -> Result<String, UpdateError> {
        let identifier = stager::random_identifier();
        let staging_parent = self
            .config
            .primary_root
            .parent()
            .unwrap_or(self.config.primary_root.as_path())
            .to_path_buf();

        stager::stage_into_root(
            self.unpacker.as_ref(),
            archive,
            &staging_parent,
            &self.config.primary_root,
            &identifier,
        )?;
        self.notify(85);

        stager::stage_into_root(
            self.unpacker.as_ref(),
            archive,
            &staging_parent,
            &self.config.durable_root,
            &identifier,
        )?;
        self.notify(100);

        info!("installed bundle {}", identifier);
        Ok(identifier)
    }

    /// Identifiers currently stored under the primary root.
    pub fn list(&self) -> Vec<String> {
        storage::list_versions(&self.config.primary_root)
    }

    /// Make `identifier` the active version.
    ///
    /// The single consistency gate of the system: succeeds only when
    /// both roots hold a valid version directory for the identifier, and
    /// then persists the whole pointer triple at once. On failure the
    /// pointer is left untouched.
    pub fn activate(&self, identifier: &str, version_name: &str) -> bool {
        let complete = storage::is_valid_version_dir(&self.config.primary_root, identifier)
            && storage::is_valid_version_dir(&self.config.durable_root, identifier);

        if complete {
            let pointer = ActivePointer {
                primary_path: storage::version_path(&self.config.primary_root, identifier)
                    .display()
                    .to_string(),
                durable_path: storage::version_path(&self.config.durable_root, identifier)
                    .display()
                    .to_string(),
                version_name: version_name.to_string(),
            };
            if self.store.store(&pointer) {
                info!("activated {} as {}", identifier, version_name);
                stats::send_stats(&self.config, StatsAction::Set, version_name);
                return true;
            }
            warn!("activation of {} failed, pointer not persisted", identifier);
        } else {
            warn!("activation of {} refused, version incomplete", identifier);
        }

        stats::send_stats(&self.config, StatsAction::SetFail, version_name);
        false
    }

    /// Remove `identifier` from both roots.
    ///
    /// Success means the durable copy is gone; a missing primary copy is
    /// tolerated since ephemeral storage may already have been cleared.
    /// Deleting the active identifier does not clear the activation
    /// pointer; callers that do so should `reset` or activate another
    /// version themselves.
    pub fn delete(&self, identifier: &str, version_name: &str) -> bool {
        storage::remove_tree(&storage::version_path(&self.config.primary_root, identifier));

        if !storage::remove_tree(&storage::version_path(&self.config.durable_root, identifier)) {
            return false;
        }
        info!("deleted {}", identifier);
        stats::send_stats(&self.config, StatsAction::Delete, version_name);
        true
    }

    /// Clear the activation pointer unconditionally. Disk content is
    /// untouched; only the pointer state goes back to unset.
    pub fn reset(&self) {
        let previous = self.store.load().version_name;
        stats::send_stats(&self.config, StatsAction::Reset, &previous);
        if !self.store.clear() {
            warn!("activation pointer not fully cleared");
        }
        info!("activation pointer reset");
    }

    /// Active version directory under the primary root; empty if unset.
    pub fn active_primary_path(&self) -> String {
        self.store.load().primary_path
    }

    /// Active version directory under the durable root; empty if unset.
    pub fn active_durable_path(&self) -> String {
        self.store.load().durable_path
    }

    /// Caller-assigned name of the active version; empty if unset.
    pub fn active_version_name(&self) -> String {
        self.store.load().version_name
    }

    fn reported_version_name(&self) -> String {
        let name = self.store.load().version_name;
        if name.is_empty() {
            DEFAULT_VERSION_NAME.to_string()
        } else {
            name
        }
    }

    fn notify(&self, percent: u8) {
        self.notify_download.as_ref()(percent);
    }
}
