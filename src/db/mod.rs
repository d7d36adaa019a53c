mod access_group;
mod token;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use access_group::{AccessGroup, AccessGroupStore};
pub use token::{TokenRecord, TokenStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let pool = if path == ":memory:" {
            // Every connection to sqlite::memory: is its own database, so keep
            // exactly one alive for the lifetime of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&format!("sqlite:{}?mode=rwc", path))
                .await?
        };

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Timestamps are Unix seconds (UTC)
                "CREATE TABLE access_groups (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )",
                "CREATE INDEX idx_access_groups_created_at ON access_groups(created_at)",
                // No foreign key: token lookups tolerate a missing group
                "CREATE TABLE jwt_tokens (
                    id TEXT PRIMARY KEY NOT NULL,
                    access_group TEXT NOT NULL,
                    signature TEXT NOT NULL,
                    valid_until INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    last_refresh INTEGER,
                    refresh_count INTEGER NOT NULL DEFAULT 0
                )",
                "CREATE INDEX idx_jwt_tokens_lookup ON jwt_tokens(access_group, signature)",
            ],
        )
        .await
    }

    /// Get the access group (credential) store.
    pub fn access_groups(&self) -> AccessGroupStore {
        AccessGroupStore::new(self.pool.clone())
    }

    /// Get the token record store.
    pub fn tokens(&self) -> TokenStore {
        TokenStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Wrap a value that failed to convert out of a row.
pub(crate) fn decode_error(
    column: &str,
    e: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    }
}

/// Read a Unix-seconds column as a UTC instant.
pub(crate) fn timestamp_column(
    column: &str,
    secs: i64,
) -> Result<chrono::DateTime<chrono::Utc>, sqlx::Error> {
    crate::clock::from_unix(secs).ok_or_else(|| {
        decode_error(
            column,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("timestamp out of range: {}", secs),
            ),
        )
    })
}

/// Read a TEXT column holding a UUID.
pub(crate) fn uuid_column(column: &str, text: &str) -> Result<uuid::Uuid, sqlx::Error> {
    uuid::Uuid::parse_str(text).map_err(|e| decode_error(column, e))
}
