//! Auto-update client for applications published through DeployHelper.
//!
//! The crate checks an update server for newer releases, streams installers
//! to disk with progress reporting and SHA-256 verification, polls in the
//! background on a fixed interval and hands off to the installer process:
//! - [`AutoUpdater`] ties the stages together around one configuration.
//! - [`EventHub`] delivers check results, progress, completion and errors to
//!   listeners registered on a client instance.

mod check;
mod config;
mod download;
mod error;
mod events;
mod install;
mod scheduler;
mod types;
mod updater;
mod version;

/// Update server query.
pub use check::{CHECK_ENDPOINT, UpdateChecker};
/// Immutable client configuration and release channels.
pub use config::{Channel, DEFAULT_TIMEOUT_SECS, UpdaterConfig, UpdaterConfigBuilder};
/// Installer download engine.
pub use download::{Downloader, ProgressSink};
pub use error::UpdaterError;
/// Per-client listener registry.
pub use events::{EventHub, ListenerId, UpdaterEvent};
/// Installer handoff primitives.
pub use install::{DEFAULT_INSTALLER_ARGS, install_and_restart, launch_installer};
pub use scheduler::Scheduler;
pub use types::{DownloadProgress, UpdateInfo};
pub use updater::{AutoUpdater, AutoUpdaterBuilder};
pub use version::is_newer_version;

pub use tokio_util::sync::CancellationToken;
