//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::auth::AuthError;

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Unprocessable(String),
    /// Request rejected before reaching a handler, with the extractor's status.
    Rejected(StatusCode, String),
    Internal,
}

impl ApiError {
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::Unprocessable(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Rejected(status, _) => *status,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        if e.is_internal() {
            error!(error = %e, "Request failed");
            return ApiError::Internal;
        }

        match e {
            AuthError::DuplicateEmail(email) => ApiError::BadRequest(format!(
                "The email '{}' is already in use, try another one.",
                email
            )),
            AuthError::InvalidCredentials => ApiError::Unauthorized(
                "The group credentials are invalid, check it and try again.".into(),
            ),
            AuthError::AccessGroupNotFound(id) => {
                ApiError::NotFound(format!("Access group with the id '{}' was not found.", id))
            }
            AuthError::MalformedIdentifier => ApiError::BadRequest(
                "The access group id must be a valid UUID, check it and try again.".into(),
            ),
            AuthError::InvalidToken => ApiError::BadRequest("The token provided is invalid.".into()),
            AuthError::ExpiredToken => {
                ApiError::Unauthorized("The token provided is expired.".into())
            }
            AuthError::Storage(_)
            | AuthError::Signing(_)
            | AuthError::Hashing(_)
            | AuthError::ExpiryOutOfRange => ApiError::Internal,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::Rejected(_, msg) => msg,
            ApiError::Internal => "Internal server error".to_string(),
        };
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                detail,
            }),
        )
            .into_response()
    }
}
