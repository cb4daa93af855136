//! Lockout data model
//!
//! | Type              | Persisted | Description                                          |
//! | ----------------- | --------- | ---------------------------------------------------- |
//! | `LockoutRecord`   | yes       | `{"attempts": n, "timestamp": epoch-millis}`         |
//! | `LockoutState`    | no        | `Open { attempts }` or `Locked { .. }`               |
//! | `LockoutPolicy`   | no        | Threshold, lock duration and expiry check cadence    |
//! | `RemainingLockout`| no        | Time left on a lock, displayed in whole minutes      |

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures that engage a lock.
pub const MAX_ATTEMPTS: u32 = 5;

/// How long a lock lasts, in minutes.
pub const LOCKOUT_MINUTES: i64 = 15;

/// How often a locked tracker checks whether its lock has expired.
pub const CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Configuration for lockout behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures needed to engage a lock.
    pub max_attempts: u32,
    /// How long an engaged lock lasts.
    pub lockout_duration: Duration,
    /// Cadence of the background expiry check.
    pub check_interval: std::time::Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            lockout_duration: Duration::minutes(LOCKOUT_MINUTES),
            check_interval: CHECK_INTERVAL,
        }
    }
}

impl LockoutPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    /// Zero is raised to one millisecond; a timer cannot tick at zero.
    pub fn with_check_interval(mut self, interval: std::time::Duration) -> Self {
        self.check_interval = interval.max(std::time::Duration::from_millis(1));
        self
    }

    /// When a lock engaged at `locked_at` lifts. `None` if that instant is
    /// outside the representable range.
    pub fn expires_at(&self, locked_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        locked_at.checked_add_signed(self.lockout_duration)
    }
}

/// The record persisted while a lock is engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutRecord {
    pub attempts: u32,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub locked_at: DateTime<Utc>,
}

/// In-memory lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Open {
        attempts: u32,
    },
    Locked {
        attempts: u32,
        locked_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

impl Default for LockoutState {
    fn default() -> Self {
        LockoutState::Open { attempts: 0 }
    }
}

impl LockoutState {
    pub fn attempts(&self) -> u32 {
        match self {
            LockoutState::Open { attempts } | LockoutState::Locked { attempts, .. } => *attempts,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockoutState::Locked { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LockoutState::Open { .. } => None,
            LockoutState::Locked { expires_at, .. } => Some(*expires_at),
        }
    }
}

/// Result of recording a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still open; `remaining` more failures engage the lock.
    Remaining { attempts: u32, remaining: u32 },
    /// This failure engaged the lock.
    LockedOut {
        attempts: u32,
        locked_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

/// Time left on an engaged lock. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RemainingLockout(Duration);

impl RemainingLockout {
    pub fn between(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self((expires_at - now).max(Duration::zero()))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whole minutes left, rounded up, so one second left reads "1 minute".
    pub fn minutes(&self) -> i64 {
        let whole = self.0.num_minutes();
        if self.0 > Duration::minutes(whole) {
            whole + 1
        } else {
            whole
        }
    }
}

impl fmt::Display for RemainingLockout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.minutes();
        if minutes == 1 {
            write!(f, "1 minute")
        } else {
            write!(f, "{minutes} minutes")
        }
    }
}
