use std::path::{Path, PathBuf};

use deploy_helper_core::{Channel, DEFAULT_TIMEOUT_SECS, UpdaterConfig, UpdaterError};
use deploy_helper_platform::{AppPaths, AppPathsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Paths(#[from] AppPathsError),
}

/// Persistent CLI settings, read from `settings.json` in the config
/// directory. Every field has a default so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub current_version: String,

    #[serde(default)]
    pub channel: Channel,

    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Polling interval used by `watch`.
    #[serde(default = "default_auto_check_interval")]
    pub auto_check_interval_minutes: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_auto_check_interval() -> u64 {
    60
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            app_id: String::new(),
            current_version: String::new(),
            channel: Channel::default(),
            download_dir: None,
            timeout_secs: default_timeout(),
            auto_check_interval_minutes: default_auto_check_interval(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl Settings {
    /// Load settings from `explicit` or, when `None`, from the platform
    /// config directory.
    ///
    /// A missing file at the default location yields the defaults; a
    /// missing explicit file is an error.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed, or when the
    /// config directory cannot be determined.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        match explicit {
            Some(path) => Self::load_from(path, true),
            None => Self::load_from(&AppPaths::new()?.settings_file(), false),
        }
    }

    fn load_from(path: &Path, required: bool) -> Result<Self, SettingsError> {
        if !path.exists() {
            if required {
                return Err(SettingsError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the updater configuration. `auto_check` selects whether the
    /// configured polling interval is carried over.
    ///
    /// # Errors
    /// Returns [`UpdaterError::InvalidConfig`] for invalid values.
    pub fn to_updater_config(&self, auto_check: bool) -> Result<UpdaterConfig, UpdaterError> {
        let mut builder =
            UpdaterConfig::builder(&self.server_url, &self.app_id, &self.current_version)
                .channel(self.channel)
                .timeout_seconds(self.timeout_secs);
        if let Some(dir) = &self.download_dir {
            builder = builder.download_path(dir);
        }
        if auto_check {
            builder = builder.auto_check_interval_minutes(self.auto_check_interval_minutes);
        }
        builder.build()
    }
}
