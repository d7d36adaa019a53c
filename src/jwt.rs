//! JWT signing and decoding for session tokens.
//!
//! Only the HMAC family is supported: the service signs and checks tokens
//! with the same shared secret.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Claims carried by a session token. Callers choose the fields; the issuer
/// adds `exp` and `jti`.
pub type Claims = Map<String, Value>;

/// Name of the numeric expiry claim (Unix seconds).
pub const EXPIRY_CLAIM: &str = "exp";

/// Name of the token id claim, equal to the token record id.
pub const TOKEN_ID_CLAIM: &str = "jti";

/// Signing configuration: key pair derived from the secret plus the algorithm.
#[derive(Clone)]
pub struct JwtConfig {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and algorithm.
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a claims map into a compact JWT.
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Decode a JWT and check its signature.
    ///
    /// The `exp` claim is not validated here. It records the expiry at
    /// issuance, while the stored token record carries the current one.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(JwtError::Decoding)?;

        Ok(token_data.claims)
    }
}

/// Parse an algorithm name, accepting only shared-secret algorithms.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, JwtError> {
    let algorithm =
        Algorithm::from_str(name).map_err(|_| JwtError::UnsupportedAlgorithm(name.to_string()))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(JwtError::UnsupportedAlgorithm(name.to_string())),
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
