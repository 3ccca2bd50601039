//! Updater configuration.
//!
//! Loaded from a TOML file with per-field defaults so a partial config
//! is always usable. The two storage roots default to the XDG-style
//! cache (ephemeral) and data (durable) directories.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Version name reported when no bundle has ever been activated.
pub const DEFAULT_VERSION_NAME: &str = "builtin";

/// Updater configuration, shared by every lifecycle component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Ephemeral root; the OS or the user may clear it at any time.
    #[serde(default = "default_primary_root")]
    pub primary_root: PathBuf,

    /// Backup root expected to survive loss of the primary root.
    #[serde(default = "default_durable_root")]
    pub durable_root: PathBuf,

    /// Version-check endpoint. Empty disables `check_for_update`.
    #[serde(default)]
    pub update_url: String,

    /// Telemetry collector endpoint. Empty disables telemetry entirely.
    #[serde(default)]
    pub stats_url: String,

    /// Application identifier sent with every remote call.
    #[serde(default)]
    pub app_id: String,

    /// Stable device identifier; generated once per config by default.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Host application build string.
    #[serde(default)]
    pub version_build: String,

    /// Host application build number.
    #[serde(default)]
    pub version_code: String,

    /// Operating system version string.
    #[serde(default)]
    pub version_os: String,

    /// Version of this updater client.
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            primary_root: default_primary_root(),
            durable_root: default_durable_root(),
            update_url: String::new(),
            stats_url: String::new(),
            app_id: String::new(),
            device_id: default_device_id(),
            version_build: String::new(),
            version_code: String::new(),
            version_os: String::new(),
            client_version: default_client_version(),
        }
    }
}

impl UpdaterConfig {
    /// Load from a TOML file, falling back to defaults when the file is
    /// missing or malformed. A bad config must never brick the updater.
    pub fn load_or_default(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("config {} not readable ({}), using defaults", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("config {} malformed ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Platform tag sent in identification headers.
    pub fn platform(&self) -> &'static str {
        std::env::consts::OS
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_primary_root() -> PathBuf {
    home_dir().join(".cache").join("bundle-updater")
}

fn default_durable_root() -> PathBuf {
    home_dir().join(".local").join("share").join("bundle-updater")
}

fn default_device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
