use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::session::types::CeremonySession;
use crate::storage::StoreError;

use super::store_type::SessionStore;

/// Process-local ceremony session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, CeremonySession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory ceremony session store");
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &CeremonySession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| s.owner != session.owner);
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn fetch(&self, token: &str) -> Result<Option<CeremonySession>, StoreError> {
        Ok(self.sessions.lock().await.get(token).cloned())
    }

    async fn take(&self, token: &str) -> Result<Option<CeremonySession>, StoreError> {
        Ok(self.sessions.lock().await.remove(token))
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(token);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}
