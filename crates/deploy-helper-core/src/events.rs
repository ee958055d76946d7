use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::error::UpdaterError;
use crate::types::{DownloadProgress, UpdateInfo};

/// Notification published by an updater to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdaterEvent {
    UpdateChecked(UpdateInfo),
    DownloadProgress(DownloadProgress),
    DownloadCompleted(PathBuf),
    Error(UpdaterError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&UpdaterEvent) + Send + Sync>;

/// Listener registry scoped to one updater instance.
///
/// Cloning yields another handle to the same registry. Listeners run
/// synchronously on the task that emits the event, outside the registry lock.
#[derive(Clone, Default)]
pub struct EventHub {
    listeners: Arc<Mutex<Vec<(ListenerId, Listener)>>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UpdaterEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` when the listener was already removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn on_update_checked<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UpdateInfo) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let UpdaterEvent::UpdateChecked(info) = event {
                listener(info);
            }
        })
    }

    pub fn on_download_progress<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&DownloadProgress) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let UpdaterEvent::DownloadProgress(progress) = event {
                listener(progress);
            }
        })
    }

    pub fn on_download_completed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let UpdaterEvent::DownloadCompleted(path) = event {
                listener(path);
            }
        })
    }

    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UpdaterError) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let UpdaterEvent::Error(error) = event {
                listener(error);
            }
        })
    }

    /// Forward every event into a bounded channel.
    ///
    /// Events are dropped while the channel is full so a slow consumer never
    /// stalls a download.
    #[must_use]
    pub fn subscribe_channel(&self, capacity: usize) -> mpsc::Receiver<UpdaterEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribe(move |event| {
            let _ = tx.try_send(event.clone());
        });
        rx
    }

    pub fn emit(&self, event: &UpdaterEvent) {
        let listeners: Vec<Listener> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
