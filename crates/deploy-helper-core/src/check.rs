use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::config::UpdaterConfig;
use crate::error::UpdaterError;
use crate::events::{EventHub, UpdaterEvent};
use crate::types::UpdateInfo;

pub const CHECK_ENDPOINT: &str = "api/update/check";
const OPERATION: &str = "update check";

/// Queries the update server for the configured application.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    config: Arc<UpdaterConfig>,
    http: reqwest::Client,
    events: EventHub,
}

impl UpdateChecker {
    pub(crate) fn new(config: Arc<UpdaterConfig>, http: reqwest::Client, events: EventHub) -> Self {
        Self {
            config,
            http,
            events,
        }
    }

    /// Full check URL including the encoded query.
    ///
    /// # Errors
    /// Returns a protocol error if the endpoint cannot be joined onto the
    /// server URL.
    pub fn check_url(&self) -> Result<Url, UpdaterError> {
        let mut url = self.config.resolve_url(CHECK_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("app_id", self.config.app_id())
            .append_pair("current_version", self.config.current_version())
            .append_pair("channel", self.config.channel().as_str());
        Ok(url)
    }

    /// Ask the server whether a newer version is available.
    ///
    /// Listeners receive [`UpdaterEvent::UpdateChecked`] before the result is
    /// returned, or [`UpdaterEvent::Error`] once on failure.
    ///
    /// # Errors
    /// Returns a network error when the request fails, a server error for a
    /// non-success status, a protocol error when the body is empty or not a
    /// valid update response, and a cancellation error when `cancel` fires.
    pub async fn check_for_update(
        &self,
        cancel: &CancellationToken,
    ) -> Result<UpdateInfo, UpdaterError> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(UpdaterError::Cancelled { operation: OPERATION }),
            result = self.fetch() => result,
        };

        match result {
            Ok(info) => {
                if info.update_available {
                    info!(
                        "Update available: {} -> {}",
                        self.config.current_version(),
                        info.latest_version.as_deref().unwrap_or("unknown")
                    );
                    if info.latest_version.is_some() && !info.is_newer_than_current() {
                        warn!(
                            "Server offered {} which is not newer than {}",
                            info.latest_version.as_deref().unwrap_or_default(),
                            info.current_version
                        );
                    }
                } else {
                    debug!("No update available for {}", self.config.app_id());
                }
                self.events.emit(&UpdaterEvent::UpdateChecked(info.clone()));
                Ok(info)
            }
            Err(error) => {
                warn!("Update check failed: {error}");
                self.events.emit(&UpdaterEvent::Error(error.clone()));
                Err(error)
            }
        }
    }

    async fn fetch(&self) -> Result<UpdateInfo, UpdaterError> {
        let url = self.check_url()?;
        debug!("Checking for updates at {url}");

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

        let body = response
            .bytes()
            .await
            .map_err(|error| UpdaterError::network(OPERATION, &error))?;
        parse_update_info(&body)
    }
}

fn parse_update_info(body: &[u8]) -> Result<UpdateInfo, UpdaterError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(UpdaterError::protocol("empty response body"));
    }
    serde_json::from_slice(body).map_err(|error| UpdaterError::protocol(error.to_string()))
}
