//! Repository traits for persisted gate state

pub mod lockout;

pub use lockout::{KeyValueLockoutRepository, LockoutRepository};
