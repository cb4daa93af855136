//! Core functionality for the latch login gate
//!
//! This crate holds the parts of the gate that carry state or rules:
//!
//! - [`validation`]: field-level checks on email and password
//! - [`services::AttemptTracker`]: the `Open` / `Locked` state machine over failed attempts
//! - [`services::LockoutTimer`]: the background check that lifts expired locks
//! - [`repositories::LockoutRepository`] and [`storage::KeyValueStore`]: storage ports
//! - [`events`]: an event bus for login and lockout notifications
//!
//! Transport to the remote authority and the form surface live in the `latch` crate.
pub mod clock;
pub mod directory;
pub mod error;
pub mod events;
pub mod lockout;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use lockout::{
    FailureOutcome, LockoutPolicy, LockoutRecord, LockoutState, RemainingLockout,
};
pub use repositories::{KeyValueLockoutRepository, LockoutRepository};
pub use services::{AttemptTracker, LockoutTimer, SharedTracker};
pub use storage::{KeyValueStore, MemoryStore};
