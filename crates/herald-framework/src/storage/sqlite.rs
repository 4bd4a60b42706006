use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::{StorageError, StorageResult, UserData, UserRepository, merge_record};
use herald_core::UserId;

/// How long a writer waits for the database lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite repository storing each record as a JSON document.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!(path = %path.as_ref().display(), "Opened SQLite user repository");
        Self::with_pool(pool).await
    }

    /// A private in-memory database.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection would see its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Uses an existing pool, creating the schema if needed.
    pub async fn with_pool(pool: SqlitePool) -> StorageResult<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.pool.is_closed() {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

fn decode(user_id: UserId, raw: &str) -> StorageResult<UserData> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StorageError::InvalidRecord {
            user_id,
            reason: format!("expected a JSON object, found {other}"),
        }),
    }
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn get_user(&self, user_id: UserId) -> StorageResult<Option<UserData>> {
        self.ensure_open()?;
        let raw: Option<String> = sqlx::query_scalar("SELECT data FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        raw.map(|raw| decode(user_id, &raw)).transpose()
    }

    async fn save_user(&self, user_id: UserId, data: UserData) -> StorageResult<()> {
        self.ensure_open()?;
        let mut tx = self.pool.begin().await?;

        // A write as the first statement takes the write lock up front, so
        // contention goes through the busy timeout instead of failing on a
        // read-to-write upgrade.
        sqlx::query("INSERT INTO users (user_id, data) VALUES (?, '{}') ON CONFLICT(user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let existing: String = sqlx::query_scalar("SELECT data FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let mut record = decode(user_id, &existing)?;
        merge_record(&mut record, user_id, data);

        sqlx::query("UPDATE users SET data = ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ?")
            .bind(serde_json::to_string(&record)?)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(user_id, "Saved user");
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> StorageResult<bool> {
        self.ensure_open()?;
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_all_users(&self) -> StorageResult<Vec<UserData>> {
        self.ensure_open()?;
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT user_id, data FROM users ORDER BY user_id")
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|(user_id, raw)| decode(*user_id, raw))
            .collect()
    }

    async fn count_users(&self) -> StorageResult<u64> {
        self.ensure_open()?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
