mod database;
mod identity_repo;
mod memory;
mod session_repo;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

use crate::core::error::StorageError;

pub use database::SqliteStore;
pub use identity_repo::IdentityRepo;
pub use memory::MemoryStore;
pub use session_repo::SessionRepo;

/// Durable string-keyed store of serialized blobs.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub mod keys {
    /// The active identity, independent of any user id
    pub const USER: &str = "user";

    pub fn sessions(user_id: &str) -> String {
        format!("chat_sessions_{user_id}")
    }

    pub fn current_session(user_id: &str) -> String {
        format!("current_session_{user_id}")
    }
}
