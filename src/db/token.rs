//! Durable token records.
//!
//! A record is created when a token is issued and afterwards only touched by
//! the sliding refresh. Records are never deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::{timestamp_column, uuid_column};

/// An issued session token and its refresh history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRecord {
    pub id: Uuid,
    pub access_group: Uuid,
    pub signature: String,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub refresh_count: i64,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    access_group: String,
    signature: String,
    valid_until: i64,
    created_at: i64,
    last_refresh: Option<i64>,
    refresh_count: i64,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = sqlx::Error;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: uuid_column("id", &row.id)?,
            access_group: uuid_column("access_group", &row.access_group)?,
            signature: row.signature,
            valid_until: timestamp_column("valid_until", row.valid_until)?,
            created_at: timestamp_column("created_at", row.created_at)?,
            last_refresh: row
                .last_refresh
                .map(|secs| timestamp_column("last_refresh", secs))
                .transpose()?,
            refresh_count: row.refresh_count,
        })
    }
}

/// Store for token records.
#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a freshly issued token.
    pub async fn insert(&self, token: &TokenRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO jwt_tokens (id, access_group, signature, valid_until, created_at, last_refresh, refresh_count) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(token.id.to_string())
        .bind(token.access_group.to_string())
        .bind(&token.signature)
        .bind(token.valid_until.timestamp())
        .bind(token.created_at.timestamp())
        .bind(token.last_refresh.map(|t| t.timestamp()))
        .bind(token.refresh_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find the token issued to `access_group` with exactly this signature.
    pub async fn find(
        &self,
        access_group: Uuid,
        signature: &str,
    ) -> Result<Option<TokenRecord>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT id, access_group, signature, valid_until, created_at, last_refresh, refresh_count FROM jwt_tokens WHERE access_group = ? AND signature = ?",
        )
        .bind(access_group.to_string())
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TokenRecord::try_from).transpose()
    }

    /// Get a token by its record ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<TokenRecord>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT id, access_group, signature, valid_until, created_at, last_refresh, refresh_count FROM jwt_tokens WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TokenRecord::try_from).transpose()
    }

    /// Slide a token's expiry to `valid_until` if it is still valid at `now`
    /// and would expire sooner than that.
    ///
    /// The check and the write are one statement, so concurrent verifications
    /// of the same token cannot overwrite each other with a stale expiry.
    /// Returns the updated record, or `None` when the condition no longer
    /// holds.
    pub async fn refresh(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<Option<TokenRecord>, sqlx::Error> {
        let now_secs = now.timestamp();
        let new_valid_until = valid_until.timestamp();

        let row: Option<TokenRow> = sqlx::query_as(
            "UPDATE jwt_tokens
                SET valid_until = ?, last_refresh = ?, refresh_count = refresh_count + 1
              WHERE id = ? AND valid_until >= ? AND valid_until < ?
              RETURNING id, access_group, signature, valid_until, created_at, last_refresh, refresh_count",
        )
        .bind(new_valid_until)
        .bind(now_secs)
        .bind(id.to_string())
        .bind(now_secs)
        .bind(new_valid_until)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TokenRecord::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::from_unix;
    use chrono::TimeDelta;
    use crate::db::Database;

    fn record(access_group: Uuid, signature: &str, created_at: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            id: Uuid::new_v4(),
            access_group,
            signature: signature.to_string(),
            valid_until: created_at + TimeDelta::seconds(120),
            created_at,
            last_refresh: None,
            refresh_count: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::open(":memory:").await.unwrap();
        let group = Uuid::new_v4();
        let token = record(group, "sig-1", from_unix(1_705_321_845).unwrap());

        db.tokens().insert(&token).await.unwrap();

        let found = db.tokens().find(group, "sig-1").await.unwrap().unwrap();
        assert_eq!(found, token);
        assert_eq!(db.tokens().get_by_id(token.id).await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_find_requires_matching_group() {
        let db = Database::open(":memory:").await.unwrap();
        let group = Uuid::new_v4();
        let token = record(group, "sig-1", from_unix(1_705_321_845).unwrap());
        db.tokens().insert(&token).await.unwrap();

        assert!(
            db.tokens()
                .find(Uuid::new_v4(), "sig-1")
                .await
                .unwrap()
                .is_none()
        );
        assert!(db.tokens().find(group, "sig-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_slides_expiry() {
        let db = Database::open(":memory:").await.unwrap();
        let t0 = from_unix(1_705_321_845).unwrap();
        let token = record(Uuid::new_v4(), "sig", t0);
        db.tokens().insert(&token).await.unwrap();

        let now = t0 + TimeDelta::seconds(65);
        let refreshed = db
            .tokens()
            .refresh(token.id, now, now + TimeDelta::seconds(60))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(refreshed.valid_until, now + TimeDelta::seconds(60));
        assert_eq!(refreshed.last_refresh, Some(now));
        assert_eq!(refreshed.refresh_count, 1);
        assert_eq!(refreshed.created_at, t0);
    }

    #[tokio::test]
    async fn test_refresh_is_conditional() {
        let db = Database::open(":memory:").await.unwrap();
        let t0 = from_unix(1_705_321_845).unwrap();
        let token = record(Uuid::new_v4(), "sig", t0);
        db.tokens().insert(&token).await.unwrap();
        let threshold = TimeDelta::seconds(60);

        // Plenty of time left
        assert!(
            db.tokens()
                .refresh(token.id, t0, t0 + threshold)
                .await
                .unwrap()
                .is_none()
        );

        // Already expired
        let late = t0 + TimeDelta::seconds(121);
        assert!(
            db.tokens()
                .refresh(token.id, late, late + threshold)
                .await
                .unwrap()
                .is_none()
        );

        // Two verifications at the same instant only extend once
        let now = t0 + TimeDelta::seconds(90);
        assert!(
            db.tokens()
                .refresh(token.id, now, now + threshold)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            db.tokens()
                .refresh(token.id, now, now + threshold)
                .await
                .unwrap()
                .is_none()
        );

        let stored = db.tokens().get_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_count, 1);
        assert_eq!(stored.valid_until, now + threshold);
    }
}
