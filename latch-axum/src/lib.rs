//! Axum routes that play the remote authority for a latch gate
//!
//! Useful for local development and end-to-end tests: credentials are
//! checked against a [`Directory`] and a fresh random token is issued for
//! every successful login.
//!
//! | Route                  | Answer                                             |
//! | ---------------------- | -------------------------------------------------- |
//! | `POST /api/auth/login` | 200 `{token}`, 401 `{message}`, 400 `{message}`    |
//! | `GET /health`          | 200 `{status, version}`                            |
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use latch_core::directory::{CredentialRecord, InMemoryDirectory};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Arc::new(InMemoryDirectory::new());
//! directory.add_user(CredentialRecord::new("user@example.com", "secret"));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, latch_axum::create_router(directory)).await?;
//! # Ok(())
//! # }
//! ```
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use latch_core::directory::Directory;

pub mod error;
pub mod token;
pub mod types;

use error::{AuthorityError, Result};
use types::{HealthResponse, LoginRequest, TokenResponse};

pub const LOGIN_PATH: &str = "/api/auth/login";

#[derive(Clone)]
struct AppState {
    directory: Arc<dyn Directory>,
}

pub fn create_router(directory: Arc<dyn Directory>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(LOGIN_PATH, post(login_handler))
        .with_state(AppState { directory })
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AuthorityError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    if !state
        .directory
        .verify(&request.email, &request.password)
        .await?
    {
        tracing::info!("Rejected login attempt");
        return Err(AuthorityError::InvalidCredentials);
    }

    let token = token::generate_prefixed_id(token::TOKEN_PREFIX)?;
    tracing::info!(remember_me = request.remember_me, "Issued session token");

    Ok(Json(TokenResponse { token }))
}
