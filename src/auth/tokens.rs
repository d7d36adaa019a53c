//! Token issuance, verification, and sliding refresh.
//!
//! A token moves through `ISSUED -> USED -> ... -> EXPIRED`. Every
//! verification that lands inside the refresh threshold pushes the expiry to
//! `now + refresh_threshold`, so a token that keeps being used never expires.
//! The stored record is the authority: a signature the store does not know is
//! invalid no matter what it decodes to.

use chrono::TimeDelta;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::errors::AuthError;
use crate::clock::Clock;
use crate::db::{Database, TokenRecord};
use crate::jwt::{Claims, EXPIRY_CLAIM, JwtConfig, TOKEN_ID_CLAIM};

/// Default lifetime of a freshly issued token.
pub const DEFAULT_VALIDITY_WINDOW_SECS: u32 = 120;

/// Default window before expiry in which a verification slides the expiry.
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u32 = 60;

/// Token lifetime settings.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub validity_window: TimeDelta,
    pub refresh_threshold: TimeDelta,
    /// Also check the signature cryptographically on verification.
    pub verify_signature: bool,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            validity_window: TimeDelta::seconds(i64::from(DEFAULT_VALIDITY_WINDOW_SECS)),
            refresh_threshold: TimeDelta::seconds(i64::from(DEFAULT_REFRESH_THRESHOLD_SECS)),
            verify_signature: false,
        }
    }
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    db: Database,
    jwt: Arc<JwtConfig>,
    clock: Arc<dyn Clock>,
    policy: TokenPolicy,
}

impl TokenService {
    pub fn new(
        db: Database,
        jwt: Arc<JwtConfig>,
        clock: Arc<dyn Clock>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            db,
            jwt,
            clock,
            policy,
        }
    }

    /// Sign `claims` for `access_group` and persist the token record.
    ///
    /// `exp` and `jti` are set by the issuer and override any caller value.
    pub async fn issue(
        &self,
        mut claims: Claims,
        access_group: Uuid,
    ) -> Result<TokenRecord, AuthError> {
        let now = self.clock.now();
        let valid_until = now
            .checked_add_signed(self.policy.validity_window)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        let id = Uuid::new_v4();

        claims.insert(EXPIRY_CLAIM.to_string(), json!(valid_until.timestamp()));
        claims.insert(TOKEN_ID_CLAIM.to_string(), json!(id.to_string()));
        let signature = self.jwt.sign(&claims)?;

        let token = TokenRecord {
            id,
            access_group,
            signature,
            valid_until,
            created_at: now,
            last_refresh: None,
            refresh_count: 0,
        };
        self.db.tokens().insert(&token).await?;

        info!(token = %token.id, access_group = %access_group, valid_until = %valid_until, "Token issued");
        Ok(token)
    }

    /// Check that `signature` was issued to `access_group` and has not
    /// expired, sliding the expiry forward when it is close.
    pub async fn verify_and_refresh(
        &self,
        access_group: Uuid,
        signature: &str,
    ) -> Result<TokenRecord, AuthError> {
        let Some(token) = self.db.tokens().find(access_group, signature).await? else {
            debug!(access_group = %access_group, "Unknown token presented");
            return Err(AuthError::InvalidToken);
        };

        if self.policy.verify_signature {
            if let Err(e) = self.jwt.decode(signature) {
                debug!(token = %token.id, error = %e, "Stored token failed signature check");
                return Err(AuthError::InvalidToken);
            }
        }

        let now = self.clock.now();
        if now > token.valid_until {
            debug!(token = %token.id, "Expired token presented");
            return Err(AuthError::ExpiredToken);
        }

        if token.valid_until - now >= self.policy.refresh_threshold {
            return Ok(token);
        }

        let extended = now
            .checked_add_signed(self.policy.refresh_threshold)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        if let Some(refreshed) = self
            .db
            .tokens()
            .refresh(token.id, now, extended)
            .await?
        {
            info!(
                token = %refreshed.id,
                valid_until = %refreshed.valid_until,
                refresh_count = refreshed.refresh_count,
                "Token refreshed"
            );
            return Ok(refreshed);
        }

        // A concurrent verification changed the row between our read and the
        // conditional update. Judge the row as it is now.
        let current = self
            .db
            .tokens()
            .get_by_id(token.id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if now > current.valid_until {
            return Err(AuthError::ExpiredToken);
        }
        Ok(current)
    }
}
