//! Remote version check and archive download.
//!
//! The transfer itself runs on a background thread with callback-driven
//! progress; `download_to_temp` bridges it back to a plain blocking call
//! by waiting on a one-shot channel. Raw transfer progress is rescaled
//! into the 10-70 window so the caller-visible bar stays monotonic
//! across the whole download-then-install sequence.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::UpdaterConfig;
use crate::error::UpdateError;
use crate::stager;
use crate::updater::ProgressCallback;

/// Window of the caller-visible progress range owned by the transfer.
pub const TRANSFER_MIN_PERCENT: u8 = 10;
pub const TRANSFER_MAX_PERCENT: u8 = 70;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Wire shape of the version-check response. Every field is optional;
/// a response without a usable `url` means no update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestResponse {
    pub version: Option<String>,
    pub url: Option<String>,
    pub message: Option<String>,
    pub major: Option<bool>,
}

/// Descriptor of an available update.
#[derive(Debug, Clone)]
pub struct LatestVersion {
    pub version: String,
    pub url: String,
    pub message: Option<String>,
    pub major: bool,
}

impl LatestResponse {
    /// None when the response advertises nothing downloadable.
    pub fn into_latest(self) -> Option<LatestVersion> {
        let url = self.url.filter(|u| !u.is_empty())?;
        Some(LatestVersion {
            version: self.version.unwrap_or_default(),
            url,
            message: self.message,
            major: self.major.unwrap_or(false),
        })
    }
}

fn apply_headers(
    request: reqwest::blocking::RequestBuilder,
    config: &UpdaterConfig,
    version_name: &str,
) -> reqwest::blocking::RequestBuilder {
    request
        .header("upd_platform", config.platform())
        .header("upd_device_id", &config.device_id)
        .header("upd_app_id", &config.app_id)
        .header("upd_version_build", &config.version_build)
        .header("upd_version_code", &config.version_code)
        .header("upd_version_os", &config.version_os)
        .header("upd_plugin_version", &config.client_version)
        .header("upd_version_name", version_name)
}

/// Blocking version check against `endpoint`. Transport or decode
/// failures degrade to "no update available" with a warning, never an
/// error.
pub fn check_latest(
    config: &UpdaterConfig,
    endpoint: &str,
    version_name: &str,
) -> Option<LatestVersion> {
    if endpoint.is_empty() {
        return None;
    }
    let client = reqwest::blocking::Client::new();
    let request = apply_headers(client.get(endpoint), config, version_name).timeout(CHECK_TIMEOUT);

    let response = match request.send() {
        Ok(r) => r,
        Err(e) => {
            warn!("version check failed: {}", e);
            return None;
        }
    };
    if !response.status().is_success() {
        warn!("version check returned {}", response.status());
        return None;
    }
    let decoded: LatestResponse = match response.json() {
        Ok(d) => d,
        Err(e) => {
            warn!("version check response malformed: {}", e);
            return None;
        }
    };
    decoded.into_latest()
}

/// Rescale a raw 0-100 percentage into the `[min, max]` sub-range.
pub fn scale_percent(percent: u8, min: u8, max: u8) -> u8 {
    let (p, min, max) = (u32::from(percent.min(100)), u32::from(min), u32::from(max));
    (p * (max - min) / 100 + min) as u8
}

/// Stream `url` into a fresh temp archive next to the primary root.
///
/// The fetch runs on a background thread; progress callbacks fire there,
/// rescaled into the 10-70 window and deduplicated so the sequence is
/// strictly increasing. The calling thread blocks on a one-shot channel
/// until the transfer lands or fails.
pub fn download_to_temp(
    config: &UpdaterConfig,
    url: &str,
    notify: ProgressCallback,
) -> Result<PathBuf, UpdateError> {
    let parent = config
        .primary_root
        .parent()
        .unwrap_or(config.primary_root.as_path())
        .to_path_buf();
    fs::create_dir_all(&parent)
        .map_err(|e| UpdateError::transport(format!("cannot create {}: {}", parent.display(), e)))?;
    let dest = parent.join(format!("download-{}.tar.gz", stager::random_identifier()));

    let (tx, rx) = mpsc::sync_channel::<Result<(), UpdateError>>(1);
    let worker_url = url.to_string();
    let worker_dest = dest.clone();
    std::thread::spawn(move || {
        let outcome = transfer(&worker_url, &worker_dest, notify.as_ref());
        if outcome.is_err() {
            let _ = fs::remove_file(&worker_dest);
        }
        let _ = tx.send(outcome);
    });

    let outcome = rx
        .recv()
        .unwrap_or_else(|_| Err(UpdateError::transport("download worker disappeared")));
    match outcome {
        Ok(()) => {
            debug!("downloaded {} to {}", url, dest.display());
            Ok(dest)
        }
        Err(e) => Err(e),
    }
}

fn transfer(
    url: &str,
    dest: &std::path::Path,
    notify: &(dyn Fn(u8) + Send + Sync),
) -> Result<(), UpdateError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(None)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;
    let mut response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(UpdateError::transport(format!(
            "download returned {}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut out = fs::File::create(dest)
        .map_err(|e| UpdateError::transport(format!("cannot create {}: {}", dest.display(), e)))?;

    // Move the bar to the start of the transfer window right away, so
    // it still advances when the server sends no content length.
    notify(TRANSFER_MIN_PERCENT);

    let mut buffer = [0u8; 64 * 1024];
    let mut received: u64 = 0;
    let mut last_reported = TRANSFER_MIN_PERCENT;
    loop {
        let n = response
            .read(&mut buffer)
            .map_err(|e| UpdateError::transport(format!("read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])
            .map_err(|e| UpdateError::transport(format!("write failed: {}", e)))?;
        received += n as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            let raw = ((received * 100) / total).min(100) as u8;
            let percent = scale_percent(raw, TRANSFER_MIN_PERCENT, TRANSFER_MAX_PERCENT);
            if percent > last_reported {
                last_reported = percent;
                notify(percent);
            }
        }
    }
    Ok(())
}
