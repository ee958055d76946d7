use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Repeating background timer.
///
/// The job runs immediately on start and then once per period, each run in
/// its own task so a slow or failing run never delays or stops the next one.
/// Stopping cancels the timer together with runs still in flight; dropping
/// the scheduler stops it.
#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the timer on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn start<F, Fut>(period: Duration, job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut runs = JoinSet::new();

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!("Scheduled update check fired");
                        runs.spawn(job());
                    }
                    Some(joined) = runs.join_next(), if !runs.is_empty() => {
                        if let Err(error) = joined
                            && error.is_panic()
                        {
                            warn!("Scheduled update check panicked: {error}");
                        }
                    }
                }
            }

            runs.shutdown().await;
            debug!("Update check schedule stopped");
        });

        Self {
            period,
            cancel,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Request the timer to stop without waiting for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop the timer and wait until it and every in-flight run have ended.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::Scheduler;
    use crate::events::{EventHub, UpdaterEvent};
    use crate::types::UpdateInfo;

    const MINUTE: Duration = Duration::from_secs(60);

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> + use<> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    async fn advance(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_once_per_interval() {
        let hub = EventHub::new();
        let checks = Arc::new(AtomicUsize::new(0));
        let checks_for_listener = Arc::clone(&checks);
        hub.on_update_checked(move |_| {
            checks_for_listener.fetch_add(1, Ordering::SeqCst);
        });

        let job_hub = hub.clone();
        let scheduler = Scheduler::start(MINUTE, move || {
            let hub = job_hub.clone();
            async move {
                hub.emit(&UpdaterEvent::UpdateChecked(UpdateInfo::default()));
            }
        });

        advance(Duration::from_millis(1)).await;
        assert_eq!(checks.load(Ordering::SeqCst), 1);

        advance(Duration::from_secs(58)).await;
        assert_eq!(checks.load(Ordering::SeqCst), 1);

        advance(Duration::from_secs(2)).await;
        assert_eq!(checks.load(Ordering::SeqCst), 2);

        advance(MINUTE).await;
        assert_eq!(checks.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(MINUTE, counting_job(&counter));

        advance(Duration::from_millis(1)).await;
        assert!(scheduler.is_running());
        scheduler.shutdown().await;

        advance(MINUTE * 5).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_the_timer_task_runs_skips_the_first_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(MINUTE, counting_job(&counter));
        scheduler.stop();

        advance(MINUTE * 2).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_stops_it() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(MINUTE, counting_job(&counter));
        advance(Duration::from_millis(1)).await;
        drop(scheduler);

        advance(MINUTE * 3).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_panicking_run_does_not_stop_the_schedule() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_for_job = Arc::clone(&counter);
        let scheduler = Scheduler::start(MINUTE, move || {
            let run = counter_for_job.fetch_add(1, Ordering::SeqCst);
            async move {
                assert!(run != 0, "first scheduled run fails");
            }
        });

        advance(MINUTE + Duration::from_millis(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(scheduler.is_running());

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_overlap_instead_of_delaying_the_timer() {
        let started = Arc::new(AtomicUsize::new(0));
        let started_for_job = Arc::clone(&started);
        let scheduler = Scheduler::start(MINUTE, move || {
            started_for_job.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(MINUTE * 10)
        });

        advance(MINUTE * 2 + Duration::from_millis(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }
}
