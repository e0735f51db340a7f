//! Sessions issued after a successful login, kept in the cache store

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::storage::{CacheData, CacheStore, StoreError};
use crate::userdb::UserId;

use super::types::{AuthSession, StoredSession};

const SESSION_PREFIX: &str = "auth_session";
const OWNER_PREFIX: &str = "auth_session_owner";

/// Authenticated sessions with an owner index so each user has at most one.
#[derive(Clone)]
pub struct AuthSessionStore {
    cache: Arc<dyn CacheStore>,
}

impl AuthSessionStore {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Issue a session for `user_id`, revoking the user's previous one.
    #[tracing::instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        token: &str,
        user_id: &UserId,
        ttl: u64,
    ) -> Result<AuthSession, StoreError> {
        let owner_key = user_id.to_base64url();

        if let Some(previous) = self.cache.get(OWNER_PREFIX, &owner_key).await? {
            tracing::debug!("Revoking previous authenticated session");
            self.cache.remove(SESSION_PREFIX, &previous.value).await?;
        }

        let expires_at = Utc::now() + Duration::seconds(ttl as i64);
        let stored = StoredSession {
            user_id: user_id.clone(),
            expires_at,
            ttl,
        };

        self.cache
            .put_with_ttl(SESSION_PREFIX, token, CacheData::try_from(&stored)?, ttl)
            .await?;
        self.cache
            .put_with_ttl(
                OWNER_PREFIX,
                &owner_key,
                CacheData {
                    value: token.to_string(),
                },
                ttl,
            )
            .await?;

        Ok(AuthSession {
            token: token.to_string(),
            user_id: user_id.clone(),
            expires_at,
            ttl,
        })
    }

    /// Look up a live session. Expired or revoked tokens yield `None`.
    pub async fn get(&self, token: &str) -> Result<Option<AuthSession>, StoreError> {
        let Some(data) = self.cache.get(SESSION_PREFIX, token).await? else {
            return Ok(None);
        };
        let stored = StoredSession::try_from(data)?;

        if stored.expires_at <= Utc::now() {
            self.cache.remove(SESSION_PREFIX, token).await?;
            return Ok(None);
        }

        Ok(Some(AuthSession {
            token: token.to_string(),
            user_id: stored.user_id,
            expires_at: stored.expires_at,
            ttl: stored.ttl,
        }))
    }

    /// Remove a session. Unknown tokens are ignored.
    pub async fn remove(&self, token: &str) -> Result<(), StoreError> {
        if let Some(data) = self.cache.get(SESSION_PREFIX, token).await? {
            let owner_key = StoredSession::try_from(data)?.user_id.to_base64url();
            // Leave the index alone if it already points at a newer session
            if let Some(indexed) = self.cache.get(OWNER_PREFIX, &owner_key).await?
                && indexed.value == token
            {
                self.cache.remove(OWNER_PREFIX, &owner_key).await?;
            }
        }
        self.cache.remove(SESSION_PREFIX, token).await
    }

    /// The user's current live session, if any.
    #[cfg(test)]
    pub(crate) async fn live_session_for(
        &self,
        user_id: &UserId,
    ) -> Result<Option<AuthSession>, StoreError> {
        match self.cache.get(OWNER_PREFIX, &user_id.to_base64url()).await? {
            Some(token) => self.get(&token.value).await,
            None => Ok(None),
        }
    }
}
