//! Error taxonomy for the bundle lifecycle.
//!
//! Only `download` raises; every other lifecycle operation reports
//! failure through its return value and logs the cause.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Terminal errors surfaced by a `download` call.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The archive is corrupt or not a gzipped tar.
    #[error("cannot unpack archive {}", path.display())]
    UnpackFailed { path: PathBuf },

    /// Filesystem failure while placing an unpacked tree.
    #[error("cannot install bundle into {}: {source}", dest.display())]
    InstallFailed {
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Network or HTTP failure during the transfer.
    #[error("transfer failed: {reason}")]
    TransportFailed { reason: String },
}

impl UpdateError {
    pub(crate) fn transport(reason: impl Into<String>) -> Self {
        Self::TransportFailed {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(e: reqwest::Error) -> Self {
        Self::transport(e.to_string())
    }
}
