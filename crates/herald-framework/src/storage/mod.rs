//! User storage.
//!
//! A [`UserRepository`] keeps one JSON object per user. Saving merges the
//! given fields into the stored record (an upsert), and every record carries
//! its own `user_id` field.
//!
//! - [`MemoryRepository`]: process-local, always available.
//! - `SqliteRepository`: persistent, behind the `sqlite` feature.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use herald_core::UserId;

pub use memory::MemoryRepository;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;

/// A user record: a JSON object.
pub type UserData = serde_json::Map<String, serde_json::Value>;

/// Field every stored record carries.
pub const USER_ID_FIELD: &str = "user_id";

/// Errors raised by repositories.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("repository is closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid record for user {user_id}: {reason}")]
    InvalidRecord { user_id: UserId, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence of per-user data.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn get_user(&self, user_id: UserId) -> StorageResult<Option<UserData>>;

    /// Inserts the record or merges `data` into the existing one.
    async fn save_user(&self, user_id: UserId, data: UserData) -> StorageResult<()>;

    /// Returns `true` when a record was removed.
    async fn delete_user(&self, user_id: UserId) -> StorageResult<bool>;

    /// All records, ordered by user id.
    async fn get_all_users(&self) -> StorageResult<Vec<UserData>>;

    async fn count_users(&self) -> StorageResult<u64>;

    /// Releases underlying resources. Later calls fail with [`StorageError::Closed`].
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A shared, type-erased repository.
pub type BoxedRepository = Arc<dyn UserRepository>;

/// Merges `data` into `record` and stamps the user id.
pub(crate) fn merge_record(record: &mut UserData, user_id: UserId, data: UserData) {
    record.extend(data);
    record.insert(USER_ID_FIELD.to_string(), user_id.into());
}
