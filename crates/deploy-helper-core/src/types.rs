use serde::{Deserialize, Serialize};

use crate::version::is_newer_version;

/// Result of an update check, as returned by `GET /api/update/check`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    #[serde(default)]
    pub update_available: bool,
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub latest_version: Option<String>,
    /// The embedding application must not let the user skip this update.
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub release_notes: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Lowercase hex SHA-256 of the installer.
    #[serde(default)]
    pub file_hash: Option<String>,
}

impl UpdateInfo {
    /// Download URL when it is present and non-blank.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.download_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    #[must_use]
    pub fn expected_hash(&self) -> Option<&str> {
        self.file_hash
            .as_deref()
            .map(str::trim)
            .filter(|hash| !hash.is_empty())
    }

    /// Whether the update can be handed to the download engine.
    #[must_use]
    pub fn is_downloadable(&self) -> bool {
        self.update_available && self.download_url().is_some()
    }

    #[must_use]
    pub fn is_newer_than_current(&self) -> bool {
        self.latest_version
            .as_deref()
            .is_some_and(|latest| is_newer_version(latest, &self.current_version))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_received: u64,
    /// Zero when the size is unknown.
    pub total_bytes: u64,
}

impl DownloadProgress {
    /// Completed share in the 0-100 range, `None` while the size is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let ratio = self.bytes_received as f64 / self.total_bytes as f64;
        Some((ratio * 100.0).min(100.0))
    }
}
