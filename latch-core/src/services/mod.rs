//! Service layer for the lockout state machine
//!
//! This module contains the attempt tracker and the background timer that
//! lifts expired locks.

pub mod attempt_tracker;
pub mod lockout_timer;

pub use attempt_tracker::{AttemptTracker, SharedTracker};
pub use lockout_timer::LockoutTimer;
