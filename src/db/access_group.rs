use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::{timestamp_column, uuid_column};

/// A registered access group (account).
#[derive(Debug, Clone)]
pub struct AccessGroup {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the service.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AccessGroupRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    created_at: i64,
}

impl TryFrom<AccessGroupRow> for AccessGroup {
    type Error = sqlx::Error;

    fn try_from(row: AccessGroupRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: uuid_column("id", &row.id)?,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: timestamp_column("created_at", row.created_at)?,
        })
    }
}

#[derive(Clone)]
pub struct AccessGroupStore {
    pool: SqlitePool,
}

impl AccessGroupStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new access group. Fails with a unique violation if the email
    /// is taken (compared case-insensitively).
    pub async fn insert(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO access_groups (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get an access group by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<AccessGroup>, sqlx::Error> {
        let row: Option<AccessGroupRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, created_at FROM access_groups WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(AccessGroup::try_from).transpose()
    }

    /// Get an access group by email.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<AccessGroup>, sqlx::Error> {
        let row: Option<AccessGroupRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, created_at FROM access_groups WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AccessGroup::try_from).transpose()
    }

    /// List all access groups, oldest first.
    pub async fn list(&self) -> Result<Vec<AccessGroup>, sqlx::Error> {
        let rows: Vec<AccessGroupRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, created_at FROM access_groups ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AccessGroup::try_from).collect()
    }

    /// Count access groups registered under an email.
    pub async fn count_by_email(&self, email: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM access_groups WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
