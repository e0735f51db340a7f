use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::storage::StoreError;
use crate::userdb::types::{UserId, UserIdentity};

use super::store_type::CredentialStore;

/// Process-local credential store keyed by user name.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<String, UserIdentity>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory credential store");
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_user(&self, name: &str) -> Result<UserIdentity, StoreError> {
        let mut users = self.users.lock().await;
        if users.contains_key(name) {
            return Err(StoreError::AlreadyExists(format!("user '{name}'")));
        }
        let user = UserIdentity::new(name);
        users.insert(name.to_string(), user.clone());
        Ok(user)
    }

    async fn get_user_by_name(&self, name: &str) -> Result<UserIdentity, StoreError> {
        self.users
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user '{name}'")))
    }

    async fn get_user_by_credential_owner(&self, id: &UserId) -> Result<UserIdentity, StoreError> {
        self.users
            .lock()
            .await
            .values()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn save_credentials(&self, user: &UserIdentity) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user.name) {
            Some(stored) if stored.id == user.id => {
                stored.credentials = user.credentials.clone();
                stored.updated_at = chrono::Utc::now();
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!("user {}", user.id))),
        }
    }
}
