use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::Stores;
use crate::config::CoordinatorConfig;
use crate::engine::{CeremonyChallenge, CeremonyEngine};
use crate::session::{AuthSessionStore, CeremonySession, SessionStore};
use crate::storage::StoreError;
use crate::token::{RandomTokenGenerator, TokenGenerator};
use crate::userdb::{CredentialStore, UserIdentity};

use super::errors::CoordinationError;

const MAX_USERNAME_LEN: usize = 256;

/// Returned by a ceremony begin: the cookie token and the client options
#[derive(Debug, Clone, Serialize)]
pub struct CeremonyStart {
    #[serde(skip)]
    pub token: String,
    pub options: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    /// Seconds until the ceremony session expires
    pub max_age: u64,
}

/// Drives registration and login ceremonies over the injected stores.
///
/// Holds no locks of its own; races resolve in the stores.
pub struct CeremonyCoordinator {
    pub(super) engine: Arc<dyn CeremonyEngine>,
    pub(super) users: Arc<dyn CredentialStore>,
    pub(super) sessions: Arc<dyn SessionStore>,
    pub(super) auth_sessions: AuthSessionStore,
    pub(super) tokens: Arc<dyn TokenGenerator>,
    pub(super) config: CoordinatorConfig,
}

impl CeremonyCoordinator {
    pub fn new(engine: Arc<dyn CeremonyEngine>, stores: Stores, config: CoordinatorConfig) -> Self {
        Self {
            engine,
            users: stores.credentials,
            sessions: stores.sessions,
            auth_sessions: AuthSessionStore::new(stores.cache),
            tokens: Arc::new(RandomTokenGenerator),
            config,
        }
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Delete ceremony sessions past their expiry
    pub async fn purge_expired_ceremonies(&self) -> Result<u64, CoordinationError> {
        Ok(self.sessions.purge_expired(Utc::now()).await?)
    }

    /// Mint a token and persist the pending ceremony for `user`.
    pub(super) async fn open_ceremony(
        &self,
        user: &UserIdentity,
        challenge: CeremonyChallenge,
    ) -> Result<CeremonyStart, CoordinationError> {
        let token = self.tokens.generate()?;
        let expires_at = Utc::now() + Duration::seconds(self.config.ceremony_ttl as i64);

        self.sessions
            .save(&CeremonySession {
                token: token.clone(),
                owner: user.id.clone(),
                state: challenge.state,
                expires_at,
            })
            .await?;

        tracing::debug!(user_id = %user.id, "Ceremony session opened");

        Ok(CeremonyStart {
            token,
            options: challenge.options,
            expires_at,
            max_age: self.config.ceremony_ttl,
        })
    }

    /// Claim the pending ceremony for `token`, removing it from the store.
    /// Missing, unknown and expired tokens are all `SessionNotFound`.
    pub(super) async fn take_pending(
        &self,
        token: Option<&str>,
    ) -> Result<CeremonySession, CoordinationError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoordinationError::SessionNotFound.log())?;

        let session = self
            .sessions
            .take(token)
            .await?
            .ok_or_else(|| CoordinationError::SessionNotFound.log())?;

        if session.is_expired(Utc::now()) {
            tracing::info!(user_id = %session.owner, "Ceremony session expired");
            return Err(CoordinationError::SessionNotFound);
        }

        Ok(session)
    }

    /// The user a pending ceremony belongs to.
    pub(super) async fn resolve_owner(
        &self,
        session: &CeremonySession,
    ) -> Result<UserIdentity, CoordinationError> {
        match self.users.get_user_by_credential_owner(&session.owner).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(msg)) => {
                tracing::warn!(user_id = %session.owner, "Ceremony session has no owner");
                Err(CoordinationError::NotFound(msg).log())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Put a claimed ceremony back when `result` failed for a reason that
    /// leaves it usable, so the client can finish again.
    pub(super) async fn release_on_failure<T>(
        &self,
        session: &CeremonySession,
        result: Result<T, CoordinationError>,
    ) -> Result<T, CoordinationError> {
        if let Err(
            CoordinationError::StorageUnavailable(_) | CoordinationError::EntropyUnavailable(_),
        ) = &result
        {
            match self.sessions.save(session).await {
                Ok(()) => tracing::debug!(user_id = %session.owner, "Ceremony session restored"),
                Err(e) => tracing::error!(error = %e, "Failed to restore ceremony session"),
            }
        }
        result
    }

    /// Save `user.credentials`, retrying transient storage failures.
    pub(super) async fn persist_credentials(
        &self,
        user: &UserIdentity,
    ) -> Result<(), CoordinationError> {
        let attempts = self.config.credential_save_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.users.save_credentials(user).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Storage(msg)) if attempt < attempts => {
                    tracing::warn!(
                        user_id = %user.id,
                        attempt,
                        attempts,
                        error = %msg,
                        "Credential save failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Trimmed, non-empty username of bounded length
pub(super) fn validate_username(username: &str) -> Result<&str, CoordinationError> {
    let name = username.trim();
    if name.is_empty() {
        return Err(CoordinationError::InvalidInput("username must not be empty".to_string()).log());
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(CoordinationError::InvalidInput(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        ))
        .log());
    }
    Ok(name)
}
