//! Submission controller
//!
//! [`LoginController::submit`] is the single entry point the form calls. It
//! applies the guards in a fixed order (lock, in-flight, field validation),
//! performs the remote call, and turns the answer into either a
//! [`LoginSuccess`] or a [`LoginError`] the form can render. The attempt
//! tracker is only touched for success and 401 answers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use latch_core::{
    FailureOutcome, KeyValueStore, LockoutRepository, LockoutTimer, MemoryStore,
    RemainingLockout, SharedTracker,
    events::{Event, EventBus},
    storage::AUTH_TOKEN_KEY,
    validation::validate_credentials,
};
use tokio::sync::Mutex;

use crate::authority::{AuthOutcome, Authority, LoginRequest};
use crate::error::LoginError;

pub const DEFAULT_DESTINATION: &str = "/dashboard";

/// What the user typed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub remember: bool,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember: false,
        }
    }

    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember", &self.remember)
            .finish()
    }
}

/// Which slot received the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStorage {
    Durable,
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    /// Where the surface should navigate next.
    pub destination: String,
    pub token_storage: TokenStorage,
}

/// Read-only view of the lock for the form surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStatus {
    pub locked: bool,
    pub attempts: u32,
    pub max_attempts: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining: Option<RemainingLockout>,
}

/// Clears the loading flag however the submission ends, including when the
/// future is dropped mid-flight.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct LoginController {
    tracker: SharedTracker<dyn LockoutRepository>,
    authority: Arc<dyn Authority>,
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
    events: EventBus,
    destination: String,
    loading: AtomicBool,
    timer: Mutex<Option<LockoutTimer>>,
}

impl LoginController {
    /// Create a controller. The ephemeral token slot defaults to an
    /// in-process [`MemoryStore`].
    ///
    /// Call [`resume_timer`](Self::resume_timer) after restoring the tracker
    /// so a persisted lock is lifted on schedule.
    pub fn new(
        tracker: SharedTracker<dyn LockoutRepository>,
        authority: Arc<dyn Authority>,
        durable: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            tracker,
            authority,
            durable,
            ephemeral: Arc::new(MemoryStore::new()),
            events: EventBus::default(),
            destination: DEFAULT_DESTINATION.to_string(),
            loading: AtomicBool::new(false),
            timer: Mutex::new(None),
        }
    }

    pub fn with_ephemeral_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.ephemeral = store;
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn tracker(&self) -> &SharedTracker<dyn LockoutRepository> {
        &self.tracker
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Whether a submission is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub async fn lockout_status(&self) -> GateStatus {
        let tracker = self.tracker.lock().await;
        let state = tracker.state();
        GateStatus {
            locked: state.is_locked(),
            attempts: state.attempts(),
            max_attempts: tracker.policy().max_attempts,
            expires_at: state.expires_at(),
            remaining: tracker.remaining_lockout(),
        }
    }

    /// Start the expiry check if the tracker is locked and none is running.
    pub async fn resume_timer(&self) {
        let interval = {
            let tracker = self.tracker.lock().await;
            if !tracker.is_locked() {
                return;
            }
            tracker.policy().check_interval
        };
        self.start_timer(interval).await;
    }

    /// Cancel the expiry check and wait for it to stop.
    pub async fn shutdown(&self) {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.shutdown().await;
        }
    }

    /// Submit the form.
    pub async fn submit(&self, credentials: &Credentials) -> Result<LoginSuccess, LoginError> {
        self.ensure_open().await?;

        let Some(_loading) = LoadingGuard::acquire(&self.loading) else {
            tracing::debug!("Submission ignored, another one is in flight");
            return Err(LoginError::Busy);
        };

        let errors = validate_credentials(&credentials.email, &credentials.password);
        if !errors.is_empty() {
            return Err(LoginError::Validation(errors));
        }

        let request = LoginRequest {
            email: credentials.email.clone(),
            password: credentials.password.clone(),
            remember_me: credentials.remember,
        };

        let outcome = self
            .authority
            .authenticate(&request)
            .await
            .and_then(|response| response.outcome());

        match outcome {
            Ok(AuthOutcome::Success { token }) => self.complete(credentials, &token).await,
            Ok(AuthOutcome::Unauthorized) => Err(self.reject(credentials).await),
            Ok(AuthOutcome::ServerError { status }) => {
                tracing::error!(status, "Authority returned a server error");
                Err(LoginError::RemoteUnavailable(format!(
                    "authority returned status {status}"
                )))
            }
            Ok(AuthOutcome::Rejected { status, message }) => {
                tracing::debug!(status, "Authority rejected the request");
                Err(LoginError::ClientRejected { status, message })
            }
            Err(e) => {
                tracing::error!(error = %e, "Login request failed");
                Err(LoginError::RemoteUnavailable(e.to_string()))
            }
        }
    }

    /// Reject the submission while locked. An expired lock is lifted here
    /// rather than waiting for the next timer tick.
    async fn ensure_open(&self) -> Result<(), LoginError> {
        let mut tracker = self.tracker.lock().await;
        if let Err(e) = tracker.check_expiry().await {
            tracing::warn!(error = %e, "Failed to clear expired lockout");
        }

        match tracker.remaining_lockout() {
            Some(remaining) => Err(LoginError::AccountLocked { remaining }),
            None => Ok(()),
        }
    }

    async fn complete(
        &self,
        credentials: &Credentials,
        token: &str,
    ) -> Result<LoginSuccess, LoginError> {
        let now = {
            let mut tracker = self.tracker.lock().await;
            tracker.record_success().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to reset attempt tracker");
                LoginError::Internal(e)
            })?;
            tracker.now()
        };

        let (store, token_storage) = if credentials.remember {
            (&self.durable, TokenStorage::Durable)
        } else {
            (&self.ephemeral, TokenStorage::Ephemeral)
        };
        store.set(AUTH_TOKEN_KEY, token).await.map_err(|e| {
            tracing::error!(error = %e, ?token_storage, "Failed to store session token");
            LoginError::Internal(e)
        })?;

        tracing::info!(remember = credentials.remember, "Login succeeded");
        self.events
            .publish(Event::LoginSucceeded {
                email: credentials.email.clone(),
                remember: credentials.remember,
                timestamp: now,
            })
            .await;

        Ok(LoginSuccess {
            destination: self.destination.clone(),
            token_storage,
        })
    }

    async fn reject(&self, credentials: &Credentials) -> LoginError {
        let mut tracker = self.tracker.lock().await;
        let now = tracker.now();

        let error = match tracker.record_failure().await {
            Ok(FailureOutcome::Remaining {
                attempts,
                remaining,
            }) => LoginError::AuthenticationRejected {
                attempts,
                remaining,
            },
            Ok(FailureOutcome::LockedOut {
                attempts,
                expires_at,
                ..
            }) => LoginError::LockoutEngaged {
                attempts,
                expires_at,
                remaining: RemainingLockout::between(now, expires_at),
            },
            Err(e) if e.is_locked() => match tracker.remaining_lockout() {
                Some(remaining) => LoginError::AccountLocked { remaining },
                None => LoginError::Internal(e),
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to record failed attempt");
                return LoginError::Internal(e);
            }
        };

        let interval = tracker.policy().check_interval;
        drop(tracker);

        let failed_attempts = match &error {
            LoginError::AuthenticationRejected { attempts, .. }
            | LoginError::LockoutEngaged { attempts, .. } => Some(*attempts),
            _ => None,
        };
        if let Some(failed_attempts) = failed_attempts {
            self.events
                .publish(Event::LoginFailed {
                    email: credentials.email.clone(),
                    failed_attempts,
                    timestamp: now,
                })
                .await;
        }

        if matches!(error, LoginError::LockoutEngaged { .. }) {
            self.start_timer(interval).await;
        }

        error
    }

    async fn start_timer(&self, interval: std::time::Duration) {
        let mut slot = self.timer.lock().await;
        if slot.as_ref().is_some_and(|timer| !timer.is_finished()) {
            return;
        }
        *slot = Some(LockoutTimer::start(self.tracker.clone(), interval));
    }
}
