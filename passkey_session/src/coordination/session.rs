use crate::session::AuthSession;
use crate::storage::StoreError;
use crate::userdb::{CredentialSummary, UserIdentity};

use super::coordinator::CeremonyCoordinator;
use super::errors::CoordinationError;

impl CeremonyCoordinator {
    async fn live_auth_session(
        &self,
        token: Option<&str>,
    ) -> Result<AuthSession, CoordinationError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(CoordinationError::SessionNotFound)?;

        self.auth_sessions
            .get(token)
            .await?
            .ok_or(CoordinationError::SessionNotFound)
    }

    /// The user behind a live authenticated session.
    pub async fn authenticated_user(
        &self,
        token: Option<&str>,
    ) -> Result<UserIdentity, CoordinationError> {
        let session = self.live_auth_session(token).await?;

        match self.users.get_user_by_credential_owner(&session.user_id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(user_id = %session.user_id, "Authenticated session has no user");
                self.auth_sessions.remove(&session.token).await?;
                Err(CoordinationError::SessionNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// End an authenticated session. Unknown or missing tokens are ignored.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), CoordinationError> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.auth_sessions.remove(token).await?;
        }
        Ok(())
    }

    /// Credentials of the signed-in user, without key material.
    pub async fn list_credentials(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<CredentialSummary>, CoordinationError> {
        let user = self.authenticated_user(token).await?;
        Ok(user.credentials.iter().map(CredentialSummary::from).collect())
    }
}
