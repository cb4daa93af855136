//! Background expiry check for a locked tracker.
//!
//! While the tracker is locked, a task wakes on a fixed cadence and calls
//! [`AttemptTracker::check_expiry`](super::AttemptTracker::check_expiry).
//! The task ends on its own once the tracker is open again, and ends
//! immediately when cancelled. Ticks never overlap: each one finishes before
//! the next is scheduled.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::repositories::LockoutRepository;

use super::attempt_tracker::SharedTracker;

/// Handle to a running expiry check. Dropping it cancels the check.
pub struct LockoutTimer {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl LockoutTimer {
    /// Spawn the recurring check on the current tokio runtime.
    pub fn start<R>(tracker: SharedTracker<R>, interval: Duration) -> Self
    where
        R: LockoutRepository + ?Sized,
    {
        let (shutdown, mut cancelled) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => {
                        tracing::debug!("Lockout timer cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let mut tracker = tracker.lock().await;
                        if *cancelled.borrow() {
                            break;
                        }
                        if !tracker.is_locked() {
                            tracing::debug!("Tracker already open, stopping lockout timer");
                            break;
                        }

                        match tracker.check_expiry().await {
                            Ok(true) => {
                                tracing::debug!("Lock lifted, stopping lockout timer");
                                break;
                            }
                            Ok(false) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to clear expired lockout, retrying next tick");
                            }
                        }
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stop the check. No tick starts after this returns.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Lockout timer task ended abnormally");
            }
        }
    }
}

impl Drop for LockoutTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, Duration as ChronoDuration};

    use crate::clock::ManualClock;
    use crate::lockout::{LockoutPolicy, LockoutState};
    use crate::repositories::KeyValueLockoutRepository;
    use crate::services::AttemptTracker;
    use crate::storage::{KeyValueStore, LOCKOUT_KEY, MemoryStore};

    const TICK: Duration = Duration::from_secs(1);

    async fn locked_tracker() -> (
        SharedTracker<KeyValueLockoutRepository<MemoryStore>>,
        Arc<ManualClock>,
        Arc<MemoryStore>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let repo = Arc::new(KeyValueLockoutRepository::new(store.clone()));
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        ));
        let mut tracker = AttemptTracker::new(repo, LockoutPolicy::default(), clock.clone());
        for _ in 0..5 {
            tracker.record_failure().await.unwrap();
        }
        assert!(tracker.is_locked());
        (tracker.into_shared(), clock, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_lifts_expired_lock() {
        let (tracker, clock, store) = locked_tracker().await;
        let timer = LockoutTimer::start(tracker.clone(), TICK);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(tracker.lock().await.is_locked());
        assert!(!timer.is_finished());

        clock.advance(ChronoDuration::minutes(15));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(
            tracker.lock().await.state(),
            LockoutState::Open { attempts: 0 }
        );
        assert!(store.get(LOCKOUT_KEY).await.unwrap().is_none());
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_stops_ticking() {
        let (tracker, clock, store) = locked_tracker().await;
        let timer = LockoutTimer::start(tracker.clone(), TICK);
        tokio::time::sleep(Duration::from_secs(3)).await;

        timer.cancel();
        clock.advance(ChronoDuration::minutes(30));
        tokio::time::sleep(Duration::from_secs(10)).await;

        // no tick ran after cancellation, so the lock was never lifted
        assert!(tracker.lock().await.is_locked());
        assert!(store.get(LOCKOUT_KEY).await.unwrap().is_some());
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_timer_cancels() {
        let (tracker, clock, _store) = locked_tracker().await;
        let timer = LockoutTimer::start(tracker.clone(), TICK);
        drop(timer);

        clock.advance(ChronoDuration::minutes(30));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(tracker.lock().await.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_exits_when_tracker_open() {
        let (tracker, clock, _store) = locked_tracker().await;
        clock.advance(ChronoDuration::minutes(15));
        assert!(tracker.lock().await.check_expiry().await.unwrap());

        let timer = LockoutTimer::start(tracker.clone(), TICK);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_task() {
        let (tracker, _clock, _store) = locked_tracker().await;
        let timer = LockoutTimer::start(tracker.clone(), TICK);
        timer.shutdown().await;
        assert!(tracker.lock().await.is_locked());
    }
}
