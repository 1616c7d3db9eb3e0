//! Once-a-day jobs pinned to a wall-clock time.

use std::future::Future;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A job fired once per day at a fixed local time.
#[derive(Debug, Clone)]
pub struct DailyJob {
    name: &'static str,
    at: NaiveTime,
}

/// Time left until the next occurrence of `at`, strictly in the future.
fn delay_until(now: NaiveDateTime, at: NaiveTime) -> TimeDelta {
    let today = now.date().and_time(at);
    if today > now {
        today - now
    } else {
        today + TimeDelta::days(1) - now
    }
}

impl DailyJob {
    #[must_use]
    pub fn new(name: &'static str, at: NaiveTime) -> Self {
        Self { name, at }
    }

    /// Start the schedule on its own task; semantics match
    /// [`PeriodicJob::spawn`](crate::PeriodicJob::spawn).
    pub fn spawn<F, Fut>(self, cancel: CancellationToken, work: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            info!(job = self.name, at = %self.at, "daily job scheduled");
            loop {
                let delay = delay_until(Local::now().naive_local(), self.at)
                    .to_std()
                    .unwrap_or_default();

                tokio::select! {
                    () = cancel.cancelled() => {
                        info!(job = self.name, "daily job cancelled");
                        return;
                    }
                    () = sleep(delay) => {}
                }

                if let Err(err) = tokio::spawn(work()).await {
                    if err.is_panic() {
                        error!(job = self.name, "daily job firing panicked");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn delay_targets_today_when_time_is_ahead() {
        let at = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(delay_until(dt(7, 30), at), TimeDelta::minutes(90));
    }

    #[test]
    fn delay_rolls_to_tomorrow_when_time_passed() {
        let at = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(delay_until(dt(10, 0), at), TimeDelta::hours(23));
    }

    #[test]
    fn exact_hit_waits_a_full_day() {
        let at = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(delay_until(dt(9, 0), at), TimeDelta::days(1));
    }
}
