use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use futures_util::StreamExt;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

use crate::config::UpdaterConfig;
use crate::error::UpdaterError;
use crate::events::{EventHub, UpdaterEvent};
use crate::types::{DownloadProgress, UpdateInfo};

const DOWNLOAD_BUFFER_SIZE: usize = 80 * 1024;
const HASH_BUFFER_SIZE: usize = 64 * 1024;
const OPERATION: &str = "update download";

/// Per-call progress callback; receives the same values as
/// [`UpdaterEvent::DownloadProgress`] listeners.
pub type ProgressSink = dyn Fn(&DownloadProgress) + Send + Sync;

/// Streams installers to disk and verifies them.
#[derive(Debug, Clone)]
pub struct Downloader {
    config: Arc<UpdaterConfig>,
    http: reqwest::Client,
    events: EventHub,
}

impl Downloader {
    pub(crate) fn new(config: Arc<UpdaterConfig>, http: reqwest::Client, events: EventHub) -> Self {
        Self {
            config,
            http,
            events,
        }
    }

    /// Where the installer for `info` is written.
    #[must_use]
    pub fn target_path(&self, info: &UpdateInfo) -> PathBuf {
        let version = info
            .latest_version
            .as_deref()
            .map(str::trim)
            .filter(|version| !version.is_empty())
            .unwrap_or("unknown");
        let file_name = format!(
            "update_{}_{}.exe",
            sanitize_file_component(self.config.app_id()),
            sanitize_file_component(version)
        );
        self.config.download_dir().join(file_name)
    }

    /// Download the installer described by `info`.
    ///
    /// Any previous file at the target path is removed first. The payload is
    /// written to a locked temporary file next to the target and moved into
    /// place only after the stream finished and, when `file_hash` is set, the
    /// SHA-256 digest matched.
    ///
    /// # Errors
    /// Returns [`UpdaterError::InvalidState`] without touching the network
    /// when `info` has no downloadable update, and network, server, I/O,
    /// integrity or cancellation errors otherwise. Every error is also
    /// published to the error listeners.
    pub async fn download_update(
        &self,
        info: &UpdateInfo,
        progress: Option<&ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, UpdaterError> {
        let result = match info.download_url().filter(|_| info.update_available) {
            None => Err(UpdaterError::InvalidState(
                "no update to download".to_string(),
            )),
            Some(download_url) => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(UpdaterError::Cancelled { operation: OPERATION }),
                    result = self.download_to_target(info, download_url, progress) => result,
                }
            }
        };

        match result {
            Ok(path) => {
                self.events
                    .emit(&UpdaterEvent::DownloadCompleted(path.clone()));
                Ok(path)
            }
            Err(error) => {
                warn!("Update download failed: {error}");
                self.events.emit(&UpdaterEvent::Error(error.clone()));
                Err(error)
            }
        }
    }

    async fn download_to_target(
        &self,
        info: &UpdateInfo,
        download_url: &str,
        progress: Option<&ProgressSink>,
    ) -> Result<PathBuf, UpdaterError> {
        let target = self.target_path(info);
        let dir = self.config.download_dir();
        tokio::fs::create_dir_all(&dir).await.map_err(|error| {
            UpdaterError::io_with_path("failed to create download directory", &dir, &error)
        })?;
        remove_existing(&target).await?;

        let url = self.config.resolve_url(download_url)?;
        info!("Downloading update from {url}");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| UpdaterError::network(OPERATION, &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(UpdaterError::server(status, body.as_deref()));
        }

        let total = response
            .content_length()
            .filter(|length| *length > 0)
            .or(info.file_size)
            .unwrap_or(0);

        let temp = create_locked_temp_file(&dir)?;
        let file = temp.as_file().try_clone().map_err(|error| {
            UpdaterError::io_with_path("failed to open download file", temp.path(), &error)
        })?;
        let mut writer =
            BufWriter::with_capacity(DOWNLOAD_BUFFER_SIZE, tokio::fs::File::from_std(file));

        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|error| UpdaterError::network(OPERATION, &error))?;
            if chunk.is_empty() {
                continue;
            }
            writer.write_all(&chunk).await.map_err(|error| {
                UpdaterError::io_with_path("failed to write download data", temp.path(), &error)
            })?;
            received += chunk.len() as u64;

            let update = DownloadProgress {
                bytes_received: received,
                total_bytes: total,
            };
            if let Some(sink) = progress {
                sink(&update);
            }
            self.events.emit(&UpdaterEvent::DownloadProgress(update));
        }

        writer.flush().await.map_err(|error| {
            UpdaterError::io_with_path("failed to flush download file", temp.path(), &error)
        })?;
        writer.into_inner().sync_all().await.map_err(|error| {
            UpdaterError::io_with_path("failed to sync download file", temp.path(), &error)
        })?;
        FileExt::unlock(temp.as_file()).map_err(|error| {
            UpdaterError::io_with_path("failed to unlock download file", temp.path(), &error)
        })?;
        debug!("Received {received} bytes into {}", temp.path().display());

        if let Some(expected) = info.expected_hash() {
            verify_sha256(temp.path(), expected).await?;
            info!("Update checksum verified for {}", target.display());
        } else {
            debug!("No file hash supplied, skipping integrity check");
        }

        temp.persist(&target).map_err(|error| {
            UpdaterError::io_with_path("failed to move download into place", &target, &error.error)
        })?;

        info!("Download complete: {received} bytes at {}", target.display());
        Ok(target)
    }
}

fn create_locked_temp_file(dir: &Path) -> Result<NamedTempFile, UpdaterError> {
    let temp = tempfile::Builder::new()
        .prefix(".update-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|error| {
            UpdaterError::io_with_path("failed to create download file", dir, &error)
        })?;
    temp.as_file().try_lock_exclusive().map_err(|error| {
        UpdaterError::io_with_path("failed to lock download file", temp.path(), &error)
    })?;
    Ok(temp)
}

async fn remove_existing(path: &Path) -> Result<(), UpdaterError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed previous download at {}", path.display());
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(UpdaterError::io_with_path(
            "failed to remove previous download",
            path,
            &error,
        )),
    }
}

async fn verify_sha256(path: &Path, expected: &str) -> Result<(), UpdaterError> {
    let expected = normalize_expected_hash(expected);
    let actual = sha256_file(path).await?;

    if actual.eq_ignore_ascii_case(&expected) {
        Ok(())
    } else {
        warn!(
            "Checksum mismatch for {}: expected {expected}, got {actual}",
            path.display()
        );
        Err(UpdaterError::Integrity { expected, actual })
    }
}

fn normalize_expected_hash(expected: &str) -> String {
    let trimmed = expected.trim();
    let hash = match trimmed.split_once(':') {
        Some((algorithm, hash)) if algorithm.eq_ignore_ascii_case("sha256") => hash,
        _ => trimmed,
    };
    hash.to_ascii_lowercase()
}

pub(crate) async fn sha256_file(path: &Path) -> Result<String, UpdaterError> {
    let mut file = tokio::fs::File::open(path).await.map_err(|error| {
        UpdaterError::io_with_path("failed to open file for checksum", path, &error)
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; HASH_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer).await.map_err(|error| {
            UpdaterError::io_with_path("failed to read file for checksum", path, &error)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn sanitize_file_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | '+') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    cleaned.replace("..", "_")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        Downloader, normalize_expected_hash, remove_existing, sanitize_file_component,
        sha256_file, verify_sha256,
    };
    use crate::config::UpdaterConfig;
    use crate::error::UpdaterError;
    use crate::events::{EventHub, UpdaterEvent};
    use crate::types::UpdateInfo;

    fn downloader(dir: &std::path::Path) -> Downloader {
        let config = UpdaterConfig::builder("http://127.0.0.1:9", "com.company.app", "1.0.0")
            .download_path(dir)
            .build()
            .expect("config should be valid");
        Downloader::new(Arc::new(config), reqwest::Client::new(), EventHub::new())
    }

    #[test]
    fn target_path_follows_naming_scheme() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let info = UpdateInfo {
            latest_version: Some("1.2.0".to_string()),
            ..UpdateInfo::default()
        };

        assert_eq!(
            downloader(temp.path()).target_path(&info),
            temp.path().join("update_com.company.app_1.2.0.exe")
        );
    }

    #[test]
    fn target_path_uses_placeholder_for_missing_version() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = downloader(temp.path()).target_path(&UpdateInfo::default());
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("update_com.company.app_unknown.exe")
        );
    }

    #[test]
    fn sanitize_file_component_blocks_traversal() {
        assert_eq!(sanitize_file_component("../../etc/passwd"), "____etc_passwd");
        assert_eq!(sanitize_file_component("1.2.0-beta+5"), "1.2.0-beta+5");
        assert_eq!(sanitize_file_component("a\\b c"), "a_b_c");
    }

    #[test]
    fn normalize_expected_hash_strips_algorithm_prefix() {
        assert_eq!(normalize_expected_hash(" ABCD "), "abcd");
        assert_eq!(normalize_expected_hash("SHA256:ABCD"), "abcd");
    }

    #[tokio::test]
    async fn sha256_file_returns_known_digest() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let file_path = temp.path().join("payload.bin");
        std::fs::write(&file_path, b"abc").expect("payload file should be written");

        let digest = sha256_file(&file_path).await.expect("checksum should be computed");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn verify_sha256_is_case_insensitive_and_reports_mismatch() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let file_path = temp.path().join("payload.bin");
        std::fs::write(&file_path, b"abc").expect("payload file should be written");

        verify_sha256(
            &file_path,
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD",
        )
        .await
        .expect("uppercase digest should match");

        let result = verify_sha256(&file_path, &"0".repeat(64)).await;
        assert!(matches!(
            result,
            Err(UpdaterError::Integrity { ref expected, .. }) if expected == &"0".repeat(64)
        ));
    }

    #[tokio::test]
    async fn remove_existing_ignores_missing_files() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("missing.exe");
        remove_existing(&path).await.expect("missing file is not an error");

        std::fs::write(&path, b"old").expect("file should be written");
        remove_existing(&path).await.expect("existing file should be removed");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn download_without_update_fails_fast_with_invalid_state() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let downloader = downloader(temp.path());
        let mut events = downloader.events.subscribe_channel(4);
        let cancel = tokio_util::sync::CancellationToken::new();

        let info = UpdateInfo {
            update_available: true,
            download_url: Some(String::new()),
            ..UpdateInfo::default()
        };
        let result = downloader.download_update(&info, None, &cancel).await;

        let expected = UpdaterError::InvalidState("no update to download".to_string());
        assert_eq!(result, Err(expected.clone()));
        assert_eq!(
            events.try_recv().expect("error should be published"),
            UpdaterEvent::Error(expected)
        );
    }
}
