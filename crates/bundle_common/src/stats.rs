//! Fire-and-forget lifecycle telemetry.
//!
//! Sends are spawned onto a background thread and never awaited; a
//! collector outage must not slow down or fail the lifecycle. With no
//! collector configured the whole module is a no-op.

use std::time::Duration;

use tracing::debug;

use crate::config::UpdaterConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle transitions reported to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsAction {
    Set,
    SetFail,
    Delete,
    Reset,
}

impl StatsAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::SetFail => "set_fail",
            Self::Delete => "delete",
            Self::Reset => "reset",
        }
    }
}

/// Report a lifecycle transition. Never blocks, never fails the caller.
pub fn send_stats(config: &UpdaterConfig, action: StatsAction, version_name: &str) {
    if config.stats_url.is_empty() {
        return;
    }

    let url = config.stats_url.clone();
    let body = serde_json::json!({
        "platform": config.platform(),
        "action": action.as_str(),
        "device_id": config.device_id,
        "version_name": version_name,
        "version_build": config.version_build,
        "version_code": config.version_code,
        "version_os": config.version_os,
        "plugin_version": config.client_version,
        "app_id": config.app_id,
    });

    std::thread::spawn(move || {
        let client = reqwest::blocking::Client::new();
        match client.post(&url).json(&body).timeout(SEND_TIMEOUT).send() {
            Ok(_) => debug!("stats sent for {}", action.as_str()),
            Err(e) => debug!("stats send for {} failed: {}", action.as_str(), e),
        }
    });
}
