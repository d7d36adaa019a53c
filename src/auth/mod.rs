//! Credential authentication and the session token lifecycle.
//!
//! Access groups log in with email and password and receive a signed token
//! backed by a stored record. Presenting the token verifies it against that
//! record and slides its expiry when it is about to run out.

mod credentials;
mod errors;
mod password;
mod tokens;

pub use credentials::{CredentialAuthenticator, parse_id};
pub use errors::AuthError;
pub use password::{Argon2Hasher, PasswordHasher};
pub use tokens::{
    DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_VALIDITY_WINDOW_SECS, TokenPolicy, TokenService,
};
