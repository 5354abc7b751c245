use std::sync::Arc;

use super::{keys, KvStore};
use crate::core::error::StorageError;
use crate::core::identity::Identity;

pub struct IdentityRepo {
    store: Arc<dyn KvStore>,
}

impl IdentityRepo {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<Option<Identity>, StorageError> {
        let Some(raw) = self.store.get(keys::USER).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                tracing::warn!("ignoring corrupt stored identity: {e}");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, identity: &Identity) -> Result<(), StorageError> {
        let json =
            serde_json::to_string(identity).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(keys::USER, &json).await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(keys::USER).await
    }
}
