use std::sync::{Arc, PoisonError, RwLock};

use crate::core::error::AuthError;
use crate::core::identity::Identity;
use crate::storage::{IdentityRepo, KvStore};

/// Holds the signed-in identity and persists it across runs.
///
/// There is no password check: any non-blank email signs in.
pub struct IdentityProvider {
    repo: IdentityRepo,
    current: RwLock<Option<Identity>>,
    default_api_key: String,
}

impl IdentityProvider {
    pub fn new(store: Arc<dyn KvStore>, default_api_key: impl Into<String>) -> Self {
        Self {
            repo: IdentityRepo::new(store),
            current: RwLock::new(None),
            default_api_key: default_api_key.into(),
        }
    }

    /// Pick up the identity left by a previous run, if any.
    pub async fn restore(&self) -> Result<Option<Identity>, AuthError> {
        let identity = self.repo.load().await?;
        self.set_current(identity.clone());
        Ok(identity)
    }

    pub async fn sign_in(&self, email: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        let name = email.split('@').next().map(str::to_string);
        self.activate(Identity::new(email, name)).await
    }

    pub async fn sign_up(&self, email: &str, name: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        let name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
        self.activate(Identity::new(email, name)).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.repo.clear().await?;
        if let Some(identity) = self.take_current() {
            tracing::info!(user_id = %identity.id, "signed out");
        }
        Ok(())
    }

    pub fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in_as(&self, user_id: &str) -> bool {
        self.current().is_some_and(|i| i.id == user_id)
    }

    /// The user's own key when set, otherwise the process-wide default.
    pub fn api_key(&self) -> String {
        self.current()
            .as_ref()
            .and_then(|i| i.own_api_key().map(str::to_string))
            .unwrap_or_else(|| self.default_api_key.clone())
    }

    pub fn masked_api_key(&self) -> String {
        mask(&self.api_key())
    }

    /// Store a new key for the signed-in user. Returns false when nobody is signed in.
    pub async fn update_api_key(&self, key: &str) -> Result<bool, AuthError> {
        let Some(mut identity) = self.current() else {
            return Ok(false);
        };
        identity.api_key = Some(key.trim().to_string());
        self.repo.save(&identity).await?;
        self.set_current(Some(identity));
        Ok(true)
    }

    async fn activate(&self, identity: Identity) -> Result<Identity, AuthError> {
        self.repo.save(&identity).await?;
        self.set_current(Some(identity.clone()));
        tracing::info!(user_id = %identity.id, email = %identity.email, "signed in");
        Ok(identity)
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }

    fn take_current(&self) -> Option<Identity> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::EmptyEmail);
    }
    Ok(email.to_string())
}

fn mask(key: &str) -> String {
    "•".repeat(key.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn provider() -> (IdentityProvider, Arc<dyn KvStore>) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        (IdentityProvider::new(store.clone(), "default-key"), store)
    }

    #[tokio::test]
    async fn test_sign_in_derives_name() {
        let (auth, _) = provider();
        let identity = auth.sign_in("  ana@example.com ").await.unwrap();
        assert_eq!(identity.email, "ana@example.com");
        assert_eq!(identity.name.as_deref(), Some("ana"));
        assert!(identity.id.starts_with("user_"));
        assert_eq!(auth.current(), Some(identity));
    }

    #[tokio::test]
    async fn test_sign_in_rejects_blank_email() {
        let (auth, _) = provider();
        assert!(matches!(auth.sign_in("   ").await, Err(AuthError::EmptyEmail)));
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_keeps_name() {
        let (auth, _) = provider();
        let identity = auth.sign_up("bo@example.com", "Bo Lind").await.unwrap();
        assert_eq!(identity.name.as_deref(), Some("Bo Lind"));
    }

    #[tokio::test]
    async fn test_identity_survives_restart() {
        let (auth, store) = provider();
        let identity = auth.sign_in("ana@example.com").await.unwrap();

        let again = IdentityProvider::new(store, "default-key");
        assert!(again.current().is_none());
        assert_eq!(again.restore().await.unwrap(), Some(identity.clone()));
        assert!(again.is_signed_in_as(&identity.id));
    }

    #[tokio::test]
    async fn test_sign_out_clears_storage() {
        let (auth, store) = provider();
        auth.sign_in("ana@example.com").await.unwrap();
        auth.sign_out().await.unwrap();
        assert!(auth.current().is_none());

        let again = IdentityProvider::new(store, "default-key");
        assert!(again.restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_key_falls_back_to_default() {
        let (auth, _) = provider();
        assert_eq!(auth.api_key(), "default-key");

        auth.sign_in("ana@example.com").await.unwrap();
        assert_eq!(auth.api_key(), "default-key");

        assert!(auth.update_api_key("sk-user").await.unwrap());
        assert_eq!(auth.api_key(), "sk-user");
        assert_eq!(auth.masked_api_key(), "•••••••");

        assert!(auth.update_api_key("").await.unwrap());
        assert_eq!(auth.api_key(), "default-key");
    }

    #[tokio::test]
    async fn test_update_api_key_requires_identity() {
        let (auth, _) = provider();
        assert!(!auth.update_api_key("sk-user").await.unwrap());
        assert_eq!(auth.api_key(), "default-key");
    }

    #[tokio::test]
    async fn test_api_key_persisted() {
        let (auth, store) = provider();
        auth.sign_in("ana@example.com").await.unwrap();
        auth.update_api_key("sk-user").await.unwrap();

        let again = IdentityProvider::new(store, "default-key");
        again.restore().await.unwrap();
        assert_eq!(again.api_key(), "sk-user");
    }

    #[tokio::test]
    async fn test_poisoned_lock_keeps_working() {
        let (auth, _) = provider();
        let first = auth.sign_in("ana@example.com").await.unwrap();

        let joined = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = auth.current.write().unwrap();
                panic!("writer panicked while holding the lock");
            })
            .join()
        });
        assert!(joined.is_err());
        assert!(auth.current.is_poisoned());

        assert_eq!(auth.current(), Some(first));
        let second = auth.sign_in("bo@example.com").await.unwrap();
        assert_eq!(auth.current(), Some(second));
        auth.sign_out().await.unwrap();
        assert!(auth.current().is_none());
    }
}
