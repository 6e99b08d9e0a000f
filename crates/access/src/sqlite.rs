//! SQLite user store and usage ledger.
//!
//! Two tables in a single database file:
//! - `users`: one row per user, written only through upsert
//! - `token_usage`: one row per successful completion

use async_trait::async_trait;
use chrono::Utc;
use memochat_core::error::StoreError;
use memochat_core::provider::Usage;
use memochat_core::user::{UsageLedger, UsageTier, UserRecord, UserStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed [`UserStore`] and [`UsageLedger`].
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Open (or create) the database at `url` and run migrations.
    ///
    /// `"sqlite::memory:"` gives an ephemeral database on a single connection.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every in-memory connection is its own database.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite user store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id               INTEGER PRIMARY KEY,
                username              TEXT,
                language_code         TEXT,
                default_language_code TEXT,
                custom_api_key        TEXT,
                usage_tier            TEXT,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS token_usage (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id           INTEGER NOT NULL,
                prompt_tokens     INTEGER NOT NULL,
                completion_tokens INTEGER NOT NULL,
                total_tokens      INTEGER NOT NULL,
                recorded_at       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("token_usage table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_token_usage_user ON token_usage(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("token_usage index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord, StoreError> {
        let user_id: i64 = row.get("user_id");
        let tier: Option<String> = row.get("usage_tier");
        let usage_tier = tier
            .map(|t| t.parse::<UsageTier>())
            .transpose()
            .map_err(|reason| StoreError::Corrupt { user_id, reason })?;

        Ok(UserRecord {
            user_id,
            username: row.get("username"),
            language_code: row.get("language_code"),
            default_language_code: row.get("default_language_code"),
            custom_api_key: row.get("custom_api_key"),
            usage_tier,
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, username, language_code, default_language_code, custom_api_key, usage_tier \
             FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Get failed: {e}")))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn upsert(&self, record: &UserRecord) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, language_code, default_language_code,
                               custom_api_key, usage_tier, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                language_code = excluded.language_code,
                default_language_code = excluded.default_language_code,
                custom_api_key = excluded.custom_api_key,
                usage_tier = excluded.usage_tier,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.user_id)
        .bind(&record.username)
        .bind(&record.language_code)
        .bind(&record.default_language_code)
        .bind(&record.custom_api_key)
        .bind(record.usage_tier.map(|t| t.as_str()))
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Upsert failed: {e}")))?;

        debug!(user_id = record.user_id, "Upserted user record");
        Ok(())
    }
}

#[async_trait]
impl UsageLedger for SqliteUserStore {
    async fn lifetime_tokens_used(&self, user_id: i64) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(total_tokens), 0) AS total FROM token_usage WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Usage query failed: {e}")))?;

        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }

    async fn record_usage(&self, user_id: i64, usage: &Usage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO token_usage (user_id, prompt_tokens, completion_tokens, total_tokens, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(user_id)
        .bind(i64::from(usage.prompt_tokens))
        .bind(i64::from(usage.completion_tokens))
        .bind(i64::from(usage.total_tokens))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Record usage failed: {e}")))?;

        debug!(user_id, total_tokens = usage.total_tokens, "Recorded token usage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memochat_core::user::UserIdentity;

    async fn test_store() -> SqliteUserStore {
        SqliteUserStore::new("sqlite::memory:").await.unwrap()
    }

    fn usage(total: u32) -> Usage {
        Usage {
            prompt_tokens: total,
            completion_tokens: 0,
            total_tokens: total,
        }
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let store = test_store().await;
        assert!(store.get(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_roundtrips_every_field() {
        let store = test_store().await;
        let mut record = UserRecord::from_identity(&UserIdentity {
            user_id: 7,
            username: Some("ann".into()),
            language_code: Some("ru".into()),
        });
        record.custom_api_key = Some("sk-user".into());
        record.usage_tier = Some(UsageTier::Premium);
        store.upsert(&record).await.unwrap();

        assert_eq!(store.get(7).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn upsert_updates_existing_row() {
        let store = test_store().await;
        let mut record = UserRecord::from_identity(&UserIdentity::new(7));
        store.upsert(&record).await.unwrap();

        record.usage_tier = Some(UsageTier::TrialEnded);
        store.upsert(&record).await.unwrap();

        let stored = store.get(7).await.unwrap().unwrap();
        assert_eq!(stored.usage_tier, Some(UsageTier::TrialEnded));
    }

    #[tokio::test]
    async fn ledger_sums_per_user() {
        let store = test_store().await;
        assert_eq!(store.lifetime_tokens_used(1).await.unwrap(), 0);

        store.record_usage(1, &usage(100)).await.unwrap();
        store.record_usage(1, &usage(250)).await.unwrap();
        store.record_usage(2, &usage(7)).await.unwrap();

        assert_eq!(store.lifetime_tokens_used(1).await.unwrap(), 350);
        assert_eq!(store.lifetime_tokens_used(2).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn unknown_tier_is_reported_as_corrupt() {
        let store = test_store().await;
        store
            .upsert(&UserRecord::from_identity(&UserIdentity::new(3)))
            .await
            .unwrap();
        sqlx::query("UPDATE users SET usage_tier = 'gold' WHERE user_id = 3")
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            store.get(3).await,
            Err(StoreError::Corrupt { user_id: 3, .. })
        ));
    }

    #[tokio::test]
    async fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("users.db").display());

        {
            let store = SqliteUserStore::new(&url).await.unwrap();
            store
                .upsert(&UserRecord::from_identity(&UserIdentity::new(11)))
                .await
                .unwrap();
            store.record_usage(11, &usage(40)).await.unwrap();
        }

        let reopened = SqliteUserStore::new(&url).await.unwrap();
        assert!(reopened.get(11).await.unwrap().is_some());
        assert_eq!(reopened.lifetime_tokens_used(11).await.unwrap(), 40);
    }
}
