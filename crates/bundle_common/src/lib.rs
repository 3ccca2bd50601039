//! Bundle Common - over-the-air bundle updater core.
//!
//! Version lifecycle manager for a locally installed application:
//! downloads a packaged asset archive, stages it into two independently
//! rooted storage areas, and lets the host switch its active content
//! between versions atomically, with rollback to a known-good version
//! via `reset`.

pub mod config;
pub mod error;
pub mod pointer;
pub mod stager;
pub mod stats;
pub mod storage;
pub mod transport;
pub mod updater;

pub use config::{UpdaterConfig, DEFAULT_VERSION_NAME};
pub use error::UpdateError;
pub use pointer::{ActivePointer, JsonPointerStore, PointerStore};
pub use stager::{TarGzUnpack, Unpack};
pub use stats::StatsAction;
pub use transport::{LatestResponse, LatestVersion};
pub use updater::{BundleUpdater, ProgressCallback};
