use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{StorageError, StorageResult, UserData, UserRepository, merge_record};
use herald_core::UserId;

/// In-memory repository. Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    users: RwLock<BTreeMap<UserId, UserData>>,
    closed: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn get_user(&self, user_id: UserId) -> StorageResult<Option<UserData>> {
        self.ensure_open()?;
        Ok(self.users.read().get(&user_id).cloned())
    }

    async fn save_user(&self, user_id: UserId, data: UserData) -> StorageResult<()> {
        self.ensure_open()?;
        let mut users = self.users.write();
        merge_record(users.entry(user_id).or_default(), user_id, data);
        debug!(user_id, "Saved user");
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> StorageResult<bool> {
        self.ensure_open()?;
        Ok(self.users.write().remove(&user_id).is_some())
    }

    async fn get_all_users(&self) -> StorageResult<Vec<UserData>> {
        self.ensure_open()?;
        Ok(self.users.read().values().cloned().collect())
    }

    async fn count_users(&self) -> StorageResult<u64> {
        self.ensure_open()?;
        Ok(self.users.read().len() as u64)
    }

    async fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
