//! Failure conditions of the credential and token operations.

use uuid::Uuid;

use crate::jwt::JwtError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already in use: {0}")]
    DuplicateEmail(String),
    /// Unknown email and wrong password are deliberately the same error.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access group not found: {0}")]
    AccessGroupNotFound(Uuid),
    #[error("malformed identifier")]
    MalformedIdentifier,
    #[error("invalid token")]
    InvalidToken,
    #[error("expired token")]
    ExpiredToken,
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("signing failure: {0}")]
    Signing(#[from] JwtError),
    #[error("password hashing failure: {0}")]
    Hashing(String),
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
}

impl AuthError {
    /// True for failures of the service itself rather than of the request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Storage(_)
                | AuthError::Signing(_)
                | AuthError::Hashing(_)
                | AuthError::ExpiryOutOfRange
        )
    }
}
