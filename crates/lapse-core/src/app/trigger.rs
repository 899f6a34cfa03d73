//! DailyTrigger - 1 日 1 回の sweep 起動
//!
//! # フロー
//! 1. Clock から次の発火時刻（UTC の `run_at`）を計算
//! 2. その時刻まで sleep（shutdown と select で競合させる）
//! 3. `Sweeper::run()` を await してから次の発火時刻を計算
//!
//! run を await してから次を計算するので、trigger 自身の発火が重なることはない。
//! 手動実行との重なりは Sweeper 側の lock が拒否する。

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::sweeper::Sweeper;
use crate::domain::SweepError;
use crate::ports::Clock;

/// The first `run_at` wall-clock time (UTC) strictly after `after`.
pub fn next_firing(after: DateTime<Utc>, run_at: NaiveTime) -> DateTime<Utc> {
    let candidate = after.date_naive().and_time(run_at).and_utc();
    if candidate > after {
        candidate
    } else {
        let tomorrow = after
            .date_naive()
            .checked_add_days(Days::new(1))
            .unwrap_or(after.date_naive());
        tomorrow.and_time(run_at).and_utc()
    }
}

/// Fires the sweeper once a day at a fixed UTC time.
pub struct DailyTrigger {
    sweeper: Arc<Sweeper>,
    clock: Arc<dyn Clock>,
    run_at: NaiveTime,
    run_on_start: bool,
}

impl DailyTrigger {
    pub fn new(sweeper: Arc<Sweeper>, clock: Arc<dyn Clock>, run_at: NaiveTime) -> Self {
        Self {
            sweeper,
            clock,
            run_at,
            run_on_start: false,
        }
    }

    /// Also fire once immediately when spawned.
    pub fn run_on_start(mut self, yes: bool) -> Self {
        self.run_on_start = yes;
        self
    }

    /// Start the trigger loop on the current tokio runtime.
    pub fn spawn(self) -> TriggerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        TriggerHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(run_at = %self.run_at, "daily sweep trigger started");

        if self.run_on_start {
            self.fire().await;
        }

        let mut after = self.clock.now();
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let now = self.clock.now();
            let next = next_firing(after.max(now), self.run_at);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "next sweep scheduled");

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // sender dropped counts as shutdown
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            self.fire().await;
            after = next;
        }

        info!("daily sweep trigger stopped");
    }

    async fn fire(&self) {
        match self.sweeper.run().await {
            Ok(report) => info!(
                sweep_id = %report.sweep_id,
                expired = report.expired,
                transitioned = report.transitioned,
                failed = report.failures.len(),
                "scheduled sweep completed"
            ),
            Err(SweepError::AlreadyRunning) => {
                warn!("scheduled sweep skipped: previous sweep still running")
            }
            Err(e) => error!(error = %e, "scheduled sweep failed"),
        }
    }
}

/// Handle to a spawned trigger.
///
/// A sweep in flight is allowed to finish; shutdown only stops waiting for the
/// next firing.
pub struct TriggerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TriggerHandle {
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            error!(error = %e, "trigger task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::executor::TransitionExecutor;
    use crate::app::sweeper::SweepOptions;
    use crate::domain::DeadlinePolicy;
    use crate::ports::{FixedClock, MockQuoteStore, QuoteStore, UlidGenerator};
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    fn two_am() -> NaiveTime {
        NaiveTime::from_hms_opt(2, 0, 0).unwrap()
    }

    #[test]
    fn next_firing_later_today() {
        assert_eq!(next_firing(at(1, 0, 0), two_am()), at(2, 0, 0));
    }

    #[test]
    fn next_firing_tomorrow_when_passed() {
        let next = next_firing(at(3, 0, 0), two_am());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap());
    }

    #[test]
    fn next_firing_is_strictly_after() {
        let next = next_firing(at(2, 0, 0), two_am());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap());
    }

    fn sweeper(store: MockQuoteStore, clock: Arc<dyn Clock>) -> Arc<Sweeper> {
        let store: Arc<dyn QuoteStore> = Arc::new(store);
        Arc::new(Sweeper::new(
            store.clone(),
            Arc::new(DeadlinePolicy::default()),
            TransitionExecutor::new(store),
            clock.clone(),
            Arc::new(UlidGenerator::new(clock)),
            SweepOptions::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_scheduled_time() {
        let mut store = MockQuoteStore::new();
        store
            .expect_list_quotes()
            .times(1)
            .returning(|| Ok(Vec::new()));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at(1, 59, 0)));

        let sweeper = sweeper(store, clock.clone());
        let handle = DailyTrigger::new(sweeper.clone(), clock, two_am()).spawn();

        // 60s until 02:00; paused time auto-advances once every task is idle
        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.shutdown_and_join().await;
        // last reference: mock expectations are verified here, not inside the task
        drop(sweeper);
    }

    #[tokio::test(start_paused = true)]
    async fn run_on_start_fires_immediately() {
        let mut store = MockQuoteStore::new();
        store
            .expect_list_quotes()
            .times(1)
            .returning(|| Ok(Vec::new()));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at(3, 0, 0)));

        let sweeper = sweeper(store, clock.clone());
        let handle = DailyTrigger::new(sweeper.clone(), clock, two_am())
            .run_on_start(true)
            .spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.shutdown_and_join().await;
        drop(sweeper);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_firing_runs_nothing() {
        let mut store = MockQuoteStore::new();
        store.expect_list_quotes().times(0);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at(3, 0, 0)));

        let sweeper = sweeper(store, clock.clone());
        let handle = DailyTrigger::new(sweeper.clone(), clock, two_am()).spawn();
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.shutdown_and_join().await;
        drop(sweeper);
    }
}
