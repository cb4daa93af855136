//! Attempt tracking and local lockout.
//!
//! The tracker counts consecutive failed submissions and engages a lock once
//! the policy threshold is reached. A lock is persisted through a
//! [`LockoutRepository`] so it survives restarts, and is lifted either by
//! [`AttemptTracker::check_expiry`] once the lock duration has elapsed or
//! never otherwise. The threat model is casual brute force from a single
//! client; this is a deterrent, not cryptographic protection.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut tracker = AttemptTracker::new(repository, LockoutPolicy::default(), clock);
//! tracker.restore().await?;
//!
//! match tracker.record_failure().await? {
//!     FailureOutcome::Remaining { remaining, .. } => println!("{remaining} attempts remaining"),
//!     FailureOutcome::LockedOut { expires_at, .. } => println!("locked until {expires_at}"),
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::Mutex;

use crate::{
    Error,
    clock::Clock,
    error::{LockoutError, StorageError},
    events::{Event, EventBus, UnlockReason},
    lockout::{FailureOutcome, LockoutPolicy, LockoutRecord, LockoutState, RemainingLockout},
    repositories::LockoutRepository,
};

/// A tracker shared between its owner and the background expiry check.
pub type SharedTracker<R> = Arc<Mutex<AttemptTracker<R>>>;

/// Two-state machine over failed login attempts.
pub struct AttemptTracker<R: LockoutRepository + ?Sized> {
    repository: Arc<R>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    events: EventBus,
    state: LockoutState,
}

impl<R: LockoutRepository + ?Sized> AttemptTracker<R> {
    /// Create an open tracker. Call [`restore`](Self::restore) to pick up a
    /// persisted lock.
    pub fn new(repository: Arc<R>, policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            policy,
            clock,
            events: EventBus::default(),
            state: LockoutState::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Wrap the tracker for sharing with a [`LockoutTimer`](super::LockoutTimer).
    pub fn into_shared(self) -> SharedTracker<R> {
        Arc::new(Mutex::new(self))
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn state(&self) -> LockoutState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    pub fn attempts(&self) -> u32 {
        self.state.attempts()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Rehydrate from the persisted record.
    ///
    /// An unexpired record yields `Locked` with the stored attempts and
    /// expiry. A stale or undecodable record is deleted and yields
    /// `Open { attempts: 0 }`. Calling this twice gives the same result.
    pub async fn restore(&mut self) -> Result<LockoutState, Error> {
        let record = match self.repository.load().await {
            Ok(record) => record,
            Err(Error::Storage(StorageError::Corrupt { key, reason })) => {
                tracing::warn!(%key, %reason, "Discarding unreadable lockout record");
                self.repository.clear().await?;
                None
            }
            Err(e) => return Err(e),
        };

        self.state = match record {
            None => LockoutState::default(),
            Some(record) => {
                let Some(expires_at) = self.policy.expires_at(record.locked_at) else {
                    tracing::warn!(
                        locked_at = %record.locked_at,
                        "Discarding lockout record with out of range timestamp"
                    );
                    self.repository.clear().await?;
                    self.state = LockoutState::default();
                    return Ok(self.state);
                };
                if self.clock.now() < expires_at {
                    tracing::info!(
                        attempts = record.attempts,
                        %expires_at,
                        "Restored active lockout"
                    );
                    LockoutState::Locked {
                        attempts: record.attempts,
                        locked_at: record.locked_at,
                        expires_at,
                    }
                } else {
                    self.repository.clear().await?;
                    tracing::info!(%expires_at, "Removed stale lockout record");
                    self.events
                        .publish(Event::AccountUnlocked {
                            reason: UnlockReason::StaleRecord,
                            timestamp: self.clock.now(),
                        })
                        .await;
                    LockoutState::default()
                }
            }
        };

        Ok(self.state)
    }

    /// Record a failed submission.
    ///
    /// Rejected with [`LockoutError::Locked`] while locked; the attempt
    /// count is left alone in that case. The failure that reaches the
    /// threshold persists the lock before the tracker reports it.
    pub async fn record_failure(&mut self) -> Result<FailureOutcome, Error> {
        if let LockoutState::Locked { expires_at, .. } = self.state {
            return Err(LockoutError::Locked { until: expires_at }.into());
        }

        let attempts = self.state.attempts().saturating_add(1);
        if attempts < self.policy.max_attempts {
            self.state = LockoutState::Open { attempts };
            tracing::debug!(attempts, "Recorded failed login attempt");
            return Ok(FailureOutcome::Remaining {
                attempts,
                remaining: self.policy.max_attempts - attempts,
            });
        }

        // millisecond precision so the in-memory expiry matches the stored one
        let locked_at = self.clock.now().trunc_subsecs(3);
        let expires_at = self
            .policy
            .expires_at(locked_at)
            .ok_or(LockoutError::ExpiryOutOfRange { locked_at })?;
        self.repository
            .save(&LockoutRecord {
                attempts,
                locked_at,
            })
            .await?;

        self.state = LockoutState::Locked {
            attempts,
            locked_at,
            expires_at,
        };
        tracing::warn!(attempts, %expires_at, "Too many failed login attempts, lock engaged");
        self.events
            .publish(Event::AccountLocked {
                failed_attempts: attempts,
                locked_until: expires_at,
                timestamp: locked_at,
            })
            .await;

        Ok(FailureOutcome::LockedOut {
            attempts,
            locked_at,
            expires_at,
        })
    }

    /// Record a successful submission: reset the count and delete any
    /// persisted record.
    pub async fn record_success(&mut self) -> Result<(), Error> {
        if let LockoutState::Locked { expires_at, .. } = self.state {
            return Err(LockoutError::Locked { until: expires_at }.into());
        }

        self.repository.clear().await?;
        self.state = LockoutState::default();
        Ok(())
    }

    /// Lift the lock if it has expired.
    ///
    /// Returns `true` when this call moved the tracker from `Locked` to
    /// `Open`. Calling it on an open tracker does nothing.
    pub async fn check_expiry(&mut self) -> Result<bool, Error> {
        let LockoutState::Locked { expires_at, .. } = self.state else {
            return Ok(false);
        };

        let now = self.clock.now();
        if now < expires_at {
            return Ok(false);
        }

        self.repository.clear().await?;
        self.state = LockoutState::default();
        tracing::info!(%expires_at, "Lockout expired");
        self.events
            .publish(Event::AccountUnlocked {
                reason: UnlockReason::LockoutExpired,
                timestamp: now,
            })
            .await;

        Ok(true)
    }

    /// Time left on the current lock, or `None` when open.
    pub fn remaining_lockout(&self) -> Option<RemainingLockout> {
        self.state
            .expires_at()
            .map(|expires_at| RemainingLockout::between(self.clock.now(), expires_at))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventHandler;
    use crate::error::EventError;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Mock repository for testing
    #[derive(Default)]
    pub(crate) struct MockLockoutRepository {
        pub record: StdMutex<Option<LockoutRecord>>,
        pub corrupt: AtomicBool,
        pub fail_writes: AtomicBool,
        pub saves: AtomicUsize,
        pub clears: AtomicUsize,
    }

    impl MockLockoutRepository {
        pub fn with_record(record: LockoutRecord) -> Self {
            let repo = Self::default();
            *repo.record.lock().unwrap() = Some(record);
            repo
        }

        pub fn stored(&self) -> Option<LockoutRecord> {
            *self.record.lock().unwrap()
        }
    }

    #[async_trait]
    impl LockoutRepository for MockLockoutRepository {
        async fn load(&self) -> Result<Option<LockoutRecord>, Error> {
            if self.corrupt.load(Ordering::SeqCst) {
                return Err(StorageError::Corrupt {
                    key: "loginLockout".to_string(),
                    reason: "garbage".to_string(),
                }
                .into());
            }
            Ok(*self.record.lock().unwrap())
        }

        async fn save(&self, record: &LockoutRecord) -> Result<(), Error> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Database("disk full".to_string()).into());
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.record.lock().unwrap() = Some(*record);
            Ok(())
        }

        async fn clear(&self) -> Result<(), Error> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Database("disk full".to_string()).into());
            }
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.corrupt.store(false, Ordering::SeqCst);
            *self.record.lock().unwrap() = None;
            Ok(())
        }
    }

    struct RecordingHandler(Arc<StdMutex<Vec<Event>>>);

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    fn tracker(
        repo: Arc<MockLockoutRepository>,
    ) -> (AttemptTracker<MockLockoutRepository>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let tracker = AttemptTracker::new(repo, LockoutPolicy::default(), clock.clone());
        (tracker, clock)
    }

    async fn lock(tracker: &mut AttemptTracker<MockLockoutRepository>) -> FailureOutcome {
        let mut outcome = None;
        for _ in 0..5 {
            outcome = Some(tracker.record_failure().await.unwrap());
        }
        outcome.unwrap()
    }

    #[tokio::test]
    async fn test_failures_below_threshold_count_down() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut tracker, _clock) = tracker(repo.clone());

        for n in 1..5 {
            let outcome = tracker.record_failure().await.unwrap();
            assert_eq!(
                outcome,
                FailureOutcome::Remaining {
                    attempts: n,
                    remaining: 5 - n
                }
            );
            assert_eq!(tracker.attempts(), n);
            assert!(!tracker.is_locked());
        }

        // nothing is persisted before the lock engages
        assert!(repo.stored().is_none());
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fifth_failure_engages_lock() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut tracker, _clock) = tracker(repo.clone());

        let outcome = lock(&mut tracker).await;
        assert_eq!(
            outcome,
            FailureOutcome::LockedOut {
                attempts: 5,
                locked_at: start(),
                expires_at: start() + Duration::minutes(15),
            }
        );
        assert!(tracker.is_locked());
        assert_eq!(
            repo.stored(),
            Some(LockoutRecord {
                attempts: 5,
                locked_at: start()
            })
        );
        assert_eq!(
            tracker.remaining_lockout().unwrap().duration(),
            Duration::minutes(15)
        );
    }

    #[tokio::test]
    async fn test_failure_while_locked_is_rejected() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut tracker, _clock) = tracker(repo.clone());
        lock(&mut tracker).await;

        let err = tracker.record_failure().await.unwrap_err();
        assert!(err.is_locked());
        assert_eq!(tracker.attempts(), 5);
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_resets_attempts() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut tracker, _clock) = tracker(repo.clone());

        for _ in 0..4 {
            tracker.record_failure().await.unwrap();
        }
        tracker.record_success().await.unwrap();
        assert_eq!(tracker.state(), LockoutState::Open { attempts: 0 });
        assert!(repo.stored().is_none());

        // the count starts over
        let outcome = tracker.record_failure().await.unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::Remaining {
                attempts: 1,
                remaining: 4
            }
        );

        // idempotent on an already clear slot
        tracker.record_success().await.unwrap();
        tracker.record_success().await.unwrap();
        assert_eq!(tracker.attempts(), 0);
    }

    #[tokio::test]
    async fn test_success_while_locked_is_rejected() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut tracker, _clock) = tracker(repo.clone());
        lock(&mut tracker).await;

        assert!(tracker.record_success().await.unwrap_err().is_locked());
        assert!(tracker.is_locked());
        assert!(repo.stored().is_some());
    }

    #[tokio::test]
    async fn test_check_expiry() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut tracker, clock) = tracker(repo.clone());

        // no-op while open
        assert!(!tracker.check_expiry().await.unwrap());

        lock(&mut tracker).await;
        clock.advance(Duration::minutes(14) + Duration::seconds(59));
        assert!(!tracker.check_expiry().await.unwrap());
        assert!(tracker.is_locked());
        assert_eq!(tracker.remaining_lockout().unwrap().to_string(), "1 minute");

        clock.advance(Duration::seconds(1));
        assert!(tracker.remaining_lockout().unwrap().is_zero());
        assert!(tracker.check_expiry().await.unwrap());
        assert_eq!(tracker.state(), LockoutState::Open { attempts: 0 });
        assert!(repo.stored().is_none());
        assert!(tracker.remaining_lockout().is_none());

        // already open
        assert!(!tracker.check_expiry().await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_active_lock() {
        let record = LockoutRecord {
            attempts: 5,
            locked_at: start(),
        };
        let repo = Arc::new(MockLockoutRepository::with_record(record));
        let (mut tracker, clock) = tracker(repo.clone());
        clock.advance(Duration::minutes(10));

        let expected = LockoutState::Locked {
            attempts: 5,
            locked_at: start(),
            expires_at: start() + Duration::minutes(15),
        };
        assert_eq!(tracker.restore().await.unwrap(), expected);
        assert_eq!(tracker.restore().await.unwrap(), expected);
        assert_eq!(repo.stored(), Some(record));
        assert_eq!(tracker.remaining_lockout().unwrap().to_string(), "5 minutes");
    }

    #[tokio::test]
    async fn test_restore_stale_lock() {
        let record = LockoutRecord {
            attempts: 5,
            locked_at: start(),
        };
        let repo = Arc::new(MockLockoutRepository::with_record(record));
        let (mut tracker, clock) = tracker(repo.clone());
        clock.advance(Duration::minutes(15));

        assert_eq!(
            tracker.restore().await.unwrap(),
            LockoutState::Open { attempts: 0 }
        );
        assert!(repo.stored().is_none());

        assert_eq!(
            tracker.restore().await.unwrap(),
            LockoutState::Open { attempts: 0 }
        );
        assert_eq!(repo.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restore_lock_written_by_previous_tracker() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut first, clock) = tracker(repo.clone());
        lock(&mut first).await;
        let locked = first.state();

        let mut second = AttemptTracker::new(repo, LockoutPolicy::default(), clock);
        assert_eq!(second.restore().await.unwrap(), locked);
    }

    #[tokio::test]
    async fn test_restore_corrupt_record_is_cleared() {
        let repo = Arc::new(MockLockoutRepository::default());
        repo.corrupt.store(true, Ordering::SeqCst);
        let (mut tracker, _clock) = tracker(repo.clone());

        assert_eq!(
            tracker.restore().await.unwrap(),
            LockoutState::Open { attempts: 0 }
        );
        assert_eq!(repo.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restore_out_of_range_timestamp_is_cleared() {
        let record = LockoutRecord {
            attempts: 5,
            locked_at: DateTime::<Utc>::MAX_UTC.trunc_subsecs(3),
        };
        let repo = Arc::new(MockLockoutRepository::with_record(record));
        let (mut tracker, _clock) = tracker(repo.clone());

        assert_eq!(
            tracker.restore().await.unwrap(),
            LockoutState::Open { attempts: 0 }
        );
        assert!(repo.stored().is_none());
        assert_eq!(repo.clears.load(Ordering::SeqCst), 1);

        // still usable afterwards
        let outcome = tracker.record_failure().await.unwrap();
        assert!(matches!(outcome, FailureOutcome::Remaining { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_failure_with_unrepresentable_expiry_leaves_state_unchanged() {
        let repo = Arc::new(MockLockoutRepository::default());
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::MAX_UTC));
        let mut tracker = AttemptTracker::new(repo.clone(), LockoutPolicy::default(), clock);
        for _ in 0..4 {
            tracker.record_failure().await.unwrap();
        }

        let err = tracker.record_failure().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Lockout(LockoutError::ExpiryOutOfRange { .. })
        ));
        assert_eq!(tracker.state(), LockoutState::Open { attempts: 4 });
        assert!(repo.stored().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let repo = Arc::new(MockLockoutRepository::default());
        let (mut tracker, _clock) = tracker(repo.clone());
        for _ in 0..4 {
            tracker.record_failure().await.unwrap();
        }

        repo.fail_writes.store(true, Ordering::SeqCst);
        let err = tracker.record_failure().await.unwrap_err();
        assert!(err.is_storage_error());
        assert_eq!(tracker.state(), LockoutState::Open { attempts: 4 });

        repo.fail_writes.store(false, Ordering::SeqCst);
        assert!(matches!(
            tracker.record_failure().await.unwrap(),
            FailureOutcome::LockedOut { attempts: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_custom_policy() {
        let repo = Arc::new(MockLockoutRepository::default());
        let clock = Arc::new(ManualClock::new(start()));
        let policy = LockoutPolicy::default()
            .with_max_attempts(2)
            .with_lockout_duration(Duration::minutes(1));
        let mut tracker = AttemptTracker::new(repo, policy, clock.clone());

        tracker.record_failure().await.unwrap();
        let outcome = tracker.record_failure().await.unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::LockedOut {
                attempts: 2,
                locked_at: start(),
                expires_at: start() + Duration::minutes(1),
            }
        );

        clock.advance(Duration::minutes(1));
        assert!(tracker.check_expiry().await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_transitions_emit_events() {
        let repo = Arc::new(MockLockoutRepository::default());
        let events = Arc::new(StdMutex::new(Vec::new()));
        let bus = EventBus::default();
        bus.register(Arc::new(RecordingHandler(events.clone()))).await;

        let clock = Arc::new(ManualClock::new(start()));
        let mut tracker =
            AttemptTracker::new(repo, LockoutPolicy::default(), clock.clone()).with_events(bus);

        lock(&mut tracker).await;
        clock.advance(Duration::minutes(15));
        tracker.check_expiry().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::AccountLocked {
                failed_attempts: 5,
                locked_until: start() + Duration::minutes(15),
                timestamp: start(),
            }
        );
        assert!(matches!(
            events[1],
            Event::AccountUnlocked {
                reason: UnlockReason::LockoutExpired,
                ..
            }
        ));
    }
}
