use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::password::HashError;
use crate::store::StoreError;

/// Message used verbatim for every login failure, whether the username is
/// unknown, the account is inactive, or the password is wrong. Keeping the
/// three cases indistinguishable avoids leaking which accounts exist.
pub const LOGIN_FAILED: &str = "invalid username or password";

/// Message for a password change whose current-password check failed.
pub const WRONG_CURRENT_PASSWORD: &str = "current password is incorrect";

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("account not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidCredentials(&'static str),
    #[error("you cannot rate your own profile")]
    SelfRatingNotAllowed,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Hashing(#[from] HashError),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl AccountError {
    fn status(&self) -> StatusCode {
        match self {
            AccountError::NotFound => StatusCode::NOT_FOUND,
            AccountError::Conflict(_) | AccountError::SelfRatingNotAllowed => {
                StatusCode::BAD_REQUEST
            }
            AccountError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AccountError::Store(StoreError::Missing(_)) => StatusCode::NOT_FOUND,
            AccountError::Store(_) | AccountError::Hashing(_) | AccountError::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// The uniform `{"message": ...}` body the original API wrapped every
/// non-payload response in.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
            // Internal detail stays out of the response body.
            return (status, Json(ApiMessage::new("internal server error"))).into_response();
        }
        (status, Json(ApiMessage::new(self.to_string()))).into_response()
    }
}
