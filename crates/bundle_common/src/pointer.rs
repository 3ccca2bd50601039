//! Persisted activation pointer.
//!
//! The pointer is a triple of (primary path, durable path, version
//! name). It is written as one record or not at all; readers must never
//! observe a torn triple. The store trait keeps persistence injectable
//! so tests and embedders can swap the backend.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The persisted triple. Unset is represented by three empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePointer {
    pub primary_path: String,
    pub durable_path: String,
    pub version_name: String,
}

impl ActivePointer {
    pub fn is_unset(&self) -> bool {
        self.primary_path.is_empty() && self.durable_path.is_empty() && self.version_name.is_empty()
    }
}

/// Atomic read/write of the activation pointer.
pub trait PointerStore {
    /// Current pointer; unset when nothing was ever persisted or the
    /// backing record is unreadable.
    fn load(&self) -> ActivePointer;

    /// Persist all three fields together. False (logged) on failure.
    fn store(&self, pointer: &ActivePointer) -> bool;

    /// Clear back to unset.
    fn clear(&self) -> bool {
        self.store(&ActivePointer::default())
    }
}

/// JSON-file backend. Writes go to a sibling file first and land via
/// `rename`, so a crash mid-write leaves the previous record intact.
pub struct JsonPointerStore {
    path: PathBuf,
}

impl JsonPointerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PointerStore for JsonPointerStore {
    fn load(&self) -> ActivePointer {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return ActivePointer::default(),
        };
        match serde_json::from_str(&contents) {
            Ok(pointer) => pointer,
            Err(e) => {
                warn!("pointer state {} corrupted: {}", self.path.display(), e);
                ActivePointer::default()
            }
        }
    }

    fn store(&self, pointer: &ActivePointer) -> bool {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("cannot create {}: {}", parent.display(), e);
                return false;
            }
        }
        let payload = match serde_json::to_vec_pretty(pointer) {
            Ok(p) => p,
            Err(e) => {
                warn!("cannot encode pointer state: {}", e);
                return false;
            }
        };
        let scratch = self.path.with_extension("new");
        if let Err(e) = fs::write(&scratch, payload) {
            warn!("cannot write {}: {}", scratch.display(), e);
            return false;
        }
        match fs::rename(&scratch, &self.path) {
            Ok(()) => true,
            Err(e) => {
                warn!("cannot persist {}: {}", self.path.display(), e);
                false
            }
        }
    }
}
