use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::check::UpdateChecker;
use crate::config::UpdaterConfig;
use crate::download::{Downloader, ProgressSink};
use crate::error::UpdaterError;
use crate::events::EventHub;
use crate::install;
use crate::scheduler::Scheduler;
use crate::types::{DownloadProgress, UpdateInfo};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Update client: checks, downloads, background polling and installer
/// handoff for one application.
///
/// The configuration and HTTP client are fixed at construction. Listeners
/// are scoped to this instance. Call [`AutoUpdater::shutdown`] to stop
/// background polling deterministically; dropping the client stops it too.
#[derive(Debug)]
pub struct AutoUpdater {
    config: Arc<UpdaterConfig>,
    events: EventHub,
    checker: UpdateChecker,
    downloader: Downloader,
    scheduler: Mutex<Option<Scheduler>>,
}

impl AutoUpdater {
    /// Build a client with no listeners registered up front.
    ///
    /// # Errors
    /// See [`AutoUpdaterBuilder::build`].
    pub fn new(config: UpdaterConfig) -> Result<Self, UpdaterError> {
        Self::builder(config).build()
    }

    #[must_use]
    pub fn builder(config: UpdaterConfig) -> AutoUpdaterBuilder {
        AutoUpdaterBuilder {
            config,
            events: EventHub::new(),
            http: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    #[must_use]
    pub fn checker(&self) -> &UpdateChecker {
        &self.checker
    }

    #[must_use]
    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// # Errors
    /// See [`UpdateChecker::check_for_update`].
    pub async fn check_for_update(
        &self,
        cancel: &CancellationToken,
    ) -> Result<UpdateInfo, UpdaterError> {
        self.checker.check_for_update(cancel).await
    }

    /// # Errors
    /// See [`Downloader::download_update`].
    pub async fn download_update(
        &self,
        info: &UpdateInfo,
        progress: Option<&ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, UpdaterError> {
        self.downloader.download_update(info, progress, cancel).await
    }

    /// Check, then download only when an update is available.
    ///
    /// # Errors
    /// Check failures are returned as-is; they were already published by the
    /// checker. Download failures are returned after being published.
    pub async fn check_and_download(
        &self,
        progress: Option<&ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<(UpdateInfo, Option<PathBuf>), UpdaterError> {
        let info = self.checker.check_for_update(cancel).await?;
        if !info.update_available {
            return Ok((info, None));
        }

        let path = self
            .downloader
            .download_update(&info, progress, cancel)
            .await?;
        Ok((info, Some(path)))
    }

    /// Start the installer and exit the current process.
    ///
    /// # Errors
    /// See [`install::install_and_restart`].
    pub fn install_and_restart(
        &self,
        installer_path: &Path,
        args: Option<&[String]>,
    ) -> Result<Infallible, UpdaterError> {
        install::install_and_restart(installer_path, args)
    }

    /// Start (or restart) background polling at the configured interval.
    ///
    /// Returns `false` without doing anything when the interval is zero.
    ///
    /// # Errors
    /// Returns [`UpdaterError::InvalidState`] when called outside a tokio
    /// runtime.
    pub fn start_auto_check(&self) -> Result<bool, UpdaterError> {
        let Some(period) = self.config.auto_check_interval() else {
            return Ok(false);
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(UpdaterError::InvalidState(
                "automatic update checks require a running tokio runtime".to_string(),
            ));
        }

        if let Some(previous) = self.lock_scheduler().take() {
            previous.stop();
        }

        let checker = self.checker.clone();
        let scheduler = Scheduler::start(period, move || {
            let checker = checker.clone();
            async move {
                if let Err(error) = checker.check_for_update(&CancellationToken::new()).await {
                    debug!("Scheduled update check failed: {error}");
                }
            }
        });

        *self.lock_scheduler() = Some(scheduler);
        info!(
            "Automatic update checks every {} minute(s)",
            self.config.auto_check_interval_minutes()
        );
        Ok(true)
    }

    pub fn stop_auto_check(&self) {
        if let Some(scheduler) = self.lock_scheduler().take() {
            scheduler.stop();
            info!("Automatic update checks stopped");
        }
    }

    #[must_use]
    pub fn is_auto_check_running(&self) -> bool {
        self.lock_scheduler()
            .as_ref()
            .is_some_and(Scheduler::is_running)
    }

    /// Stop background polling and wait for scheduled checks to wind down.
    /// No scheduled check fires after this returns.
    pub async fn shutdown(&self) {
        let scheduler = self.lock_scheduler().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
        debug!("Updater for {} shut down", self.config.app_id());
    }

    fn lock_scheduler(&self) -> std::sync::MutexGuard<'_, Option<Scheduler>> {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collects listeners before the client (and its first scheduled check)
/// starts.
#[derive(Debug)]
pub struct AutoUpdaterBuilder {
    config: UpdaterConfig,
    events: EventHub,
    http: Option<reqwest::Client>,
}

impl AutoUpdaterBuilder {
    /// Use an existing HTTP client instead of building one from the config.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    #[must_use]
    pub fn on_update_checked<F>(self, listener: F) -> Self
    where
        F: Fn(&UpdateInfo) + Send + Sync + 'static,
    {
        self.events.on_update_checked(listener);
        self
    }

    #[must_use]
    pub fn on_download_progress<F>(self, listener: F) -> Self
    where
        F: Fn(&DownloadProgress) + Send + Sync + 'static,
    {
        self.events.on_download_progress(listener);
        self
    }

    #[must_use]
    pub fn on_download_completed<F>(self, listener: F) -> Self
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.events.on_download_completed(listener);
        self
    }

    #[must_use]
    pub fn on_error<F>(self, listener: F) -> Self
    where
        F: Fn(&UpdaterError) + Send + Sync + 'static,
    {
        self.events.on_error(listener);
        self
    }

    /// The hub listeners are registered on, e.g. for
    /// [`EventHub::subscribe_channel`].
    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Build the client and, when the config has a polling interval, start
    /// background checks right away.
    ///
    /// # Errors
    /// Returns [`UpdaterError::InvalidConfig`] when the HTTP client cannot be
    /// built, and [`UpdaterError::InvalidState`] when polling is configured
    /// but no tokio runtime is running.
    pub fn build(self) -> Result<AutoUpdater, UpdaterError> {
        let http = match self.http {
            Some(client) => client,
            None => build_http_client(&self.config)?,
        };
        let config = Arc::new(self.config);

        let updater = AutoUpdater {
            checker: UpdateChecker::new(Arc::clone(&config), http.clone(), self.events.clone()),
            downloader: Downloader::new(Arc::clone(&config), http, self.events.clone()),
            events: self.events,
            config,
            scheduler: Mutex::new(None),
        };
        updater.start_auto_check()?;
        Ok(updater)
    }
}

fn build_http_client(config: &UpdaterConfig) -> Result<reqwest::Client, UpdaterError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(CONNECT_TIMEOUT.min(config.timeout()))
        .user_agent(format!("deploy-helper/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| {
            UpdaterError::InvalidConfig(format!("failed to build HTTP client: {error}"))
        })
}
