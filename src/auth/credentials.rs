//! Access group registration and credential checks.

use std::sync::{Arc, OnceLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::errors::AuthError;
use super::password::PasswordHasher;
use crate::clock::Clock;
use crate::db::{AccessGroup, Database};

/// Resolves email/password pairs to access group ids.
#[derive(Clone)]
pub struct CredentialAuthenticator {
    db: Database,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    /// Digest checked against when the email is unknown, so that path costs
    /// the same as a wrong password.
    dummy_hash: Arc<OnceLock<String>>,
}

/// Password behind `dummy_hash`. Never matches a login, since no group owns
/// the digest.
const DUMMY_PASSWORD: &str = "tokenwarden-unknown-access-group";

impl CredentialAuthenticator {
    pub fn new(db: Database, hasher: Arc<dyn PasswordHasher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            hasher,
            clock,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Register a new access group. The password is stored only as a hash.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AccessGroup, AuthError> {
        let password_hash = self.hash(password).await?;
        let group = AccessGroup {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: self.clock.now(),
        };

        self.db
            .access_groups()
            .insert(
                group.id,
                &group.name,
                &group.email,
                &group.password_hash,
                group.created_at,
            )
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AuthError::DuplicateEmail(email.to_string())
                }
                e => AuthError::Storage(e),
            })?;

        info!(access_group = %group.id, "Access group registered");
        Ok(group)
    }

    /// Resolve an email/password pair to the owning access group id.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, AuthError> {
        let Some(group) = self.db.access_groups().get_by_email(email).await? else {
            let dummy_hash = self.dummy_hash().await?;
            self.verify(password, dummy_hash).await?;
            debug!("Authentication failed");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify(password, group.password_hash).await? {
            debug!(access_group = %group.id, "Authentication failed");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(group.id)
    }

    pub async fn list(&self) -> Result<Vec<AccessGroup>, AuthError> {
        Ok(self.db.access_groups().list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<AccessGroup, AuthError> {
        self.db
            .access_groups()
            .get_by_id(id)
            .await?
            .ok_or(AuthError::AccessGroupNotFound(id))
    }

    /// Argon2 is deliberately slow, so it runs off the async workers.
    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    async fn dummy_hash(&self) -> Result<String, AuthError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = self.hash(DUMMY_PASSWORD).await?;
        Ok(self.dummy_hash.get_or_init(|| hash).clone())
    }

    async fn verify(&self, password: &str, hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }
}

/// Parse an access group id from user input.
pub fn parse_id(text: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(text.trim()).map_err(|_| AuthError::MalformedIdentifier)
}
