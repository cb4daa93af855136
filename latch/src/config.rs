use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use latch_core::LockoutPolicy;
use latch_core::lockout::{CHECK_INTERVAL, LOCKOUT_MINUTES, MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::DEFAULT_DESTINATION;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/auth/login";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://latch.db?mode=rwc";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatchConfig {
    /// URL the login request is posted to.
    pub endpoint: String,
    /// Durable store location.
    pub database_url: String,
    /// Where to go after a successful login.
    pub destination: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub lockout_minutes: i64,
    pub check_interval_ms: u64,
}

impl Default for LatchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            destination: DEFAULT_DESTINATION.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_attempts: MAX_ATTEMPTS,
            lockout_minutes: LOCKOUT_MINUTES,
            check_interval_ms: CHECK_INTERVAL.as_millis() as u64,
        }
    }
}

impl LatchConfig {
    /// Read `LATCH_*` environment variables, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            endpoint: lookup("LATCH_ENDPOINT").unwrap_or(defaults.endpoint),
            database_url: lookup("LATCH_DATABASE_URL").unwrap_or(defaults.database_url),
            destination: lookup("LATCH_DESTINATION").unwrap_or(defaults.destination),
            request_timeout_secs: parse(
                &lookup,
                "LATCH_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            max_attempts: parse(&lookup, "LATCH_MAX_ATTEMPTS", defaults.max_attempts)?,
            lockout_minutes: parse(&lookup, "LATCH_LOCKOUT_MINUTES", defaults.lockout_minutes)?,
            check_interval_ms: parse(
                &lookup,
                "LATCH_CHECK_INTERVAL_MS",
                defaults.check_interval_ms,
            )?,
        };
        config.policy()?;
        Ok(config)
    }

    /// The lockout policy these settings describe.
    ///
    /// Fails when `max_attempts`, `check_interval_ms` or `lockout_minutes`
    /// is below 1, or when the lock duration does not fit a `TimeDelta`.
    pub fn policy(&self) -> Result<LockoutPolicy, ConfigError> {
        if self.max_attempts == 0 {
            return Err(invalid("LATCH_MAX_ATTEMPTS", self.max_attempts));
        }
        if self.check_interval_ms == 0 {
            return Err(invalid("LATCH_CHECK_INTERVAL_MS", self.check_interval_ms));
        }
        let lockout_duration = Some(self.lockout_minutes)
            .filter(|minutes| *minutes >= 1)
            .and_then(TimeDelta::try_minutes)
            .ok_or_else(|| invalid("LATCH_LOCKOUT_MINUTES", self.lockout_minutes))?;

        Ok(LockoutPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_lockout_duration(lockout_duration)
            .with_check_interval(Duration::from_millis(self.check_interval_ms)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn invalid(var: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
    }
}

fn parse<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
