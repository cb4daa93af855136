use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::types::MessageResponse;

#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<latch_core::Error> for AuthorityError {
    fn from(err: latch_core::Error) -> Self {
        AuthorityError::Internal(err.to_string())
    }
}

impl IntoResponse for AuthorityError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthorityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthorityError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthorityError::Internal(ref msg) => {
                tracing::error!(error = %msg, "Login handler failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(MessageResponse {
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AuthorityError>;
