use std::sync::Arc;

use super::{keys, KvStore};
use crate::core::error::StorageError;
use crate::core::session::Session;

/// Session list and last selection of one user.
pub struct SessionRepo {
    store: Arc<dyn KvStore>,
    user_id: String,
}

impl SessionRepo {
    pub fn new(store: Arc<dyn KvStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    /// Load the stored session list. A blob that no longer parses is reported as
    /// absent so the caller can start over.
    pub async fn load(&self) -> Result<Option<Vec<Session>>, StorageError> {
        let key = keys::sessions(&self.user_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(sessions) => Ok(Some(sessions)),
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, "discarding corrupt session list: {e}");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, sessions: &[Session]) -> Result<(), StorageError> {
        let json =
            serde_json::to_string(sessions).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(&keys::sessions(&self.user_id), &json).await
    }

    pub async fn load_current(&self) -> Result<Option<String>, StorageError> {
        self.store.get(&keys::current_session(&self.user_id)).await
    }

    pub async fn save_current(&self, session_id: Option<&str>) -> Result<(), StorageError> {
        let key = keys::current_session(&self.user_id);
        match session_id {
            Some(id) => self.store.set(&key, id).await,
            None => self.store.remove(&key).await,
        }
    }
}
