//! Remote authentication authority
//!
//! The gate hands well-formed credentials to an [`Authority`] and gets back
//! a status code and a small JSON body. [`HttpAuthority`] is the real
//! client: `POST {endpoint}` with `{"email", "password", "rememberMe"}`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of the login call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// JSON body returned by the authority. Both fields are optional on the
/// wire; which one matters depends on the status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Raw answer from the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: u16,
    pub body: AuthResponseBody,
}

/// What the gate does with an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success { token: String },
    Unauthorized,
    ServerError { status: u16 },
    Rejected { status: u16, message: Option<String> },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl AuthResponse {
    pub fn new(status: u16, body: AuthResponseBody) -> Self {
        Self { status, body }
    }

    /// Classify the answer by status code.
    ///
    /// A success status without a token is malformed rather than a success.
    pub fn outcome(self) -> Result<AuthOutcome, TransportError> {
        match self.status {
            200..=299 => match self.body.token {
                Some(token) if !token.is_empty() => Ok(AuthOutcome::Success { token }),
                _ => Err(TransportError::Malformed(
                    "success response without a token".to_string(),
                )),
            },
            401 => Ok(AuthOutcome::Unauthorized),
            status if status >= 500 => Ok(AuthOutcome::ServerError { status }),
            status => Ok(AuthOutcome::Rejected {
                status,
                message: self.body.message.filter(|m| !m.trim().is_empty()),
            }),
        }
    }
}

#[async_trait]
pub trait Authority: Send + Sync + 'static {
    async fn authenticate(&self, request: &LoginRequest) -> Result<AuthResponse, TransportError>;
}

/// [`Authority`] reached over HTTP.
///
/// Redirects are not followed; a 3xx answer is treated like any other
/// non-success status.
pub struct HttpAuthority {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpAuthority {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        let client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn authenticate(&self, request: &LoginRequest) -> Result<AuthResponse, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, endpoint = %self.endpoint, "Login request failed");
                TransportError::Network(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response.json::<AuthResponseBody>().await.map_err(|e| {
            tracing::error!(error = ?e, status, "Failed to parse login response");
            TransportError::Malformed(e.to_string())
        })?;

        Ok(AuthResponse { status, body })
    }
}
