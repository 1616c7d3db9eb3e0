//! Fixed-interval jobs.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A job fired once after an initial delay and then at a fixed interval.
#[derive(Debug, Clone)]
pub struct PeriodicJob {
    name: &'static str,
    initial_delay: Duration,
    interval: Duration,
}

impl PeriodicJob {
    #[must_use]
    pub fn new(name: &'static str, initial_delay: Duration, interval: Duration) -> Self {
        Self {
            name,
            initial_delay,
            interval,
        }
    }

    /// Start the schedule on its own task.
    ///
    /// Every firing is spawned separately and awaited, so a panic inside
    /// `work` is logged without ending the schedule, and cancellation never
    /// aborts a firing already in flight.
    pub fn spawn<F, Fut>(self, cancel: CancellationToken, work: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            info!(job = self.name, interval = ?self.interval, "job scheduled");

            tokio::select! {
                () = cancel.cancelled() => {
                    info!(job = self.name, "job cancelled before first firing");
                    return;
                }
                () = sleep(self.initial_delay) => {}
            }

            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                debug!(job = self.name, "job firing");
                if let Err(err) = tokio::spawn(work()).await {
                    if err.is_panic() {
                        error!(job = self.name, "job firing panicked");
                    }
                }

                tokio::select! {
                    () = cancel.cancelled() => {
                        info!(job = self.name, "job cancelled");
                        return;
                    }
                    _ = ticker.tick() => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_then_on_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let job = PeriodicJob::new("test", Duration::from_secs(5), Duration::from_secs(10));
        let cancel = CancellationToken::new();

        let counter = count.clone();
        let handle = job.spawn(cancel.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await; // t = 6s, first firing at 5s
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(10)).await; // t = 16s, second firing at 15s
        assert_eq!(count.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_firing_fires_nothing() {
        let count = Arc::new(AtomicUsize::new(0));
        let job = PeriodicJob::new("test", Duration::from_secs(60), Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let counter = count.clone();
        let handle = job.spawn(cancel.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_firing_does_not_end_the_schedule() {
        let count = Arc::new(AtomicUsize::new(0));
        let job = PeriodicJob::new("test", Duration::from_secs(1), Duration::from_secs(10));
        let cancel = CancellationToken::new();

        let counter = count.clone();
        let handle = job.spawn(cancel.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            }
        });

        sleep(Duration::from_secs(25)).await; // firings at 1s, 11s, 21s
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
