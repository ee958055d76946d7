use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::UpdaterError;
use crate::version::parse_semver;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Release track a client is offered versions from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Beta,
    Alpha,
}

impl Channel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Beta => "beta",
            Channel::Alpha => "alpha",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UpdaterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Channel::Stable),
            "beta" => Ok(Channel::Beta),
            "alpha" => Ok(Channel::Alpha),
            other => Err(UpdaterError::InvalidConfig(format!(
                "unknown release channel '{other}' (expected stable, beta or alpha)"
            ))),
        }
    }
}

/// Immutable updater settings. Construct through [`UpdaterConfig::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    server_url: Url,
    app_id: String,
    current_version: String,
    channel: Channel,
    download_path: Option<PathBuf>,
    timeout_seconds: u64,
    auto_check_interval_minutes: u64,
}

impl UpdaterConfig {
    pub fn builder(
        server_url: impl Into<String>,
        app_id: impl Into<String>,
        current_version: impl Into<String>,
    ) -> UpdaterConfigBuilder {
        UpdaterConfigBuilder {
            server_url: server_url.into(),
            app_id: app_id.into(),
            current_version: current_version.into(),
            channel: Channel::default(),
            download_path: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            auto_check_interval_minutes: 0,
        }
    }

    /// Base URL of the update server, always ending with `/`.
    #[must_use]
    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    #[must_use]
    pub fn download_path(&self) -> Option<&Path> {
        self.download_path.as_deref()
    }

    /// Directory installers are written to: the configured override or the
    /// system temp directory.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.download_path
            .clone()
            .unwrap_or_else(deploy_helper_platform::default_download_dir)
    }

    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[must_use]
    pub fn auto_check_interval_minutes(&self) -> u64 {
        self.auto_check_interval_minutes
    }

    /// Background polling interval, `None` when polling is disabled.
    #[must_use]
    pub fn auto_check_interval(&self) -> Option<Duration> {
        (self.auto_check_interval_minutes > 0)
            .then(|| Duration::from_secs(self.auto_check_interval_minutes * 60))
    }

    /// Resolve an absolute or server-relative URL against the server base.
    ///
    /// # Errors
    /// Returns a protocol error when the URL cannot be parsed.
    pub fn resolve_url(&self, url: &str) -> Result<Url, UpdaterError> {
        self.server_url
            .join(url.trim())
            .map_err(|error| UpdaterError::protocol(format!("invalid URL '{url}': {error}")))
    }
}

#[derive(Debug, Clone)]
pub struct UpdaterConfigBuilder {
    server_url: String,
    app_id: String,
    current_version: String,
    channel: Channel,
    download_path: Option<PathBuf>,
    timeout_seconds: u64,
    auto_check_interval_minutes: u64,
}

impl UpdaterConfigBuilder {
    #[must_use]
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub fn download_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn auto_check_interval_minutes(mut self, minutes: u64) -> Self {
        self.auto_check_interval_minutes = minutes;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    /// Returns [`UpdaterError::InvalidConfig`] when the server URL is not an
    /// absolute http(s) URL, the app id or version is empty, or the timeout
    /// is zero.
    pub fn build(self) -> Result<UpdaterConfig, UpdaterError> {
        let server_url = normalize_server_url(&self.server_url)?;

        let app_id = self.app_id.trim().to_string();
        if app_id.is_empty() {
            return Err(UpdaterError::InvalidConfig("app_id must not be empty".to_string()));
        }

        let current_version = self.current_version.trim().to_string();
        if current_version.is_empty() {
            return Err(UpdaterError::InvalidConfig(
                "current_version must not be empty".to_string(),
            ));
        }
        if parse_semver(&current_version).is_none() {
            warn!("Current version '{current_version}' is not a semantic version");
        }

        if self.timeout_seconds == 0 {
            return Err(UpdaterError::InvalidConfig(
                "timeout_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(UpdaterConfig {
            server_url,
            app_id,
            current_version,
            channel: self.channel,
            download_path: self.download_path,
            timeout_seconds: self.timeout_seconds,
            auto_check_interval_minutes: self.auto_check_interval_minutes,
        })
    }
}

fn normalize_server_url(raw: &str) -> Result<Url, UpdaterError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let mut url = Url::parse(&format!("{trimmed}/")).map_err(|error| {
        UpdaterError::InvalidConfig(format!("invalid server_url '{raw}': {error}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UpdaterError::InvalidConfig(format!(
            "server_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(server_url: &str) -> UpdaterConfig {
        UpdaterConfig::builder(server_url, "com.company.app", "1.0.0")
            .build()
            .expect("config should be valid")
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = config("http://localhost:8000");

        assert_eq!(config.channel(), Channel::Stable);
        assert_eq!(config.timeout_seconds(), 300);
        assert_eq!(config.auto_check_interval_minutes(), 0);
        assert!(config.auto_check_interval().is_none());
        assert!(config.download_path().is_none());
        assert_eq!(config.download_dir(), std::env::temp_dir());
    }

    #[test]
    fn server_url_trailing_slashes_are_normalized() {
        assert_eq!(
            config("http://localhost:8000").server_url().as_str(),
            "http://localhost:8000/"
        );
        assert_eq!(
            config("http://localhost:8000///").server_url().as_str(),
            "http://localhost:8000/"
        );
        assert_eq!(
            config("https://updates.example.com/deploy").server_url().as_str(),
            "https://updates.example.com/deploy/"
        );
    }

    #[test]
    fn resolve_url_handles_relative_and_absolute_urls() {
        let config = config("https://updates.example.com/deploy");

        let relative = config.resolve_url("api/update/check").expect("relative");
        assert_eq!(
            relative.as_str(),
            "https://updates.example.com/deploy/api/update/check"
        );

        let rooted = config.resolve_url("/dl/x.exe").expect("rooted");
        assert_eq!(rooted.as_str(), "https://updates.example.com/dl/x.exe");

        let absolute = config
            .resolve_url("https://cdn.example.com/a.exe")
            .expect("absolute");
        assert_eq!(absolute.as_str(), "https://cdn.example.com/a.exe");
    }

    #[test]
    fn build_rejects_invalid_values() {
        assert!(matches!(
            UpdaterConfig::builder("not a url", "app", "1.0.0").build(),
            Err(UpdaterError::InvalidConfig(_))
        ));
        assert!(matches!(
            UpdaterConfig::builder("ftp://example.com", "app", "1.0.0").build(),
            Err(UpdaterError::InvalidConfig(_))
        ));
        assert!(matches!(
            UpdaterConfig::builder("http://example.com", "  ", "1.0.0").build(),
            Err(UpdaterError::InvalidConfig(_))
        ));
        assert!(matches!(
            UpdaterConfig::builder("http://example.com", "app", "").build(),
            Err(UpdaterError::InvalidConfig(_))
        ));
        assert!(matches!(
            UpdaterConfig::builder("http://example.com", "app", "1.0.0")
                .timeout_seconds(0)
                .build(),
            Err(UpdaterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn auto_check_interval_converts_minutes() {
        let config = UpdaterConfig::builder("http://example.com", "app", "1.0.0")
            .auto_check_interval_minutes(5)
            .build()
            .expect("config should be valid");

        assert_eq!(config.auto_check_interval(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn channel_parses_and_displays_lowercase() {
        assert_eq!("Beta".parse::<Channel>().expect("beta"), Channel::Beta);
        assert_eq!(Channel::Alpha.to_string(), "alpha");
        assert!("nightly".parse::<Channel>().is_err());
        assert_eq!(
            serde_json::to_string(&Channel::Stable).expect("serialize"),
            "\"stable\""
        );
    }
}
