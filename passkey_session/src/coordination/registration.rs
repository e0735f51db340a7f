use crate::session::CeremonySession;
use crate::userdb::UserIdentity;

use super::coordinator::{CeremonyCoordinator, CeremonyStart, validate_username};
use super::errors::CoordinationError;

impl CeremonyCoordinator {
    /// Create the account and open a registration ceremony for it.
    ///
    /// Name collisions are detected by the store's uniqueness constraint.
    #[tracing::instrument(skip(self))]
    pub async fn begin_registration(
        &self,
        username: &str,
    ) -> Result<CeremonyStart, CoordinationError> {
        let name = validate_username(username)?;
        let user = self.users.create_user(name).await?;
        let challenge = self.engine.begin_registration(&user).await?;

        self.open_ceremony(&user, challenge).await
    }

    /// Verify the attestation for a pending registration and store the credential.
    ///
    /// The session is claimed before verification, so of two concurrent
    /// finishes on one token only one proceeds. A rejected response consumes
    /// it. A storage failure after retries puts it back so the client may
    /// finish again.
    #[tracing::instrument(skip(self, token, response))]
    pub async fn finish_registration(
        &self,
        token: Option<&str>,
        response: &[u8],
    ) -> Result<UserIdentity, CoordinationError> {
        let session = self.take_pending(token).await?;
        let result = self.complete_registration(&session, response).await;
        self.release_on_failure(&session, result).await
    }

    async fn complete_registration(
        &self,
        session: &CeremonySession,
        response: &[u8],
    ) -> Result<UserIdentity, CoordinationError> {
        let mut user = self.resolve_owner(session).await?;
        let credential = self
            .engine
            .finish_registration(&user, &session.state, response)
            .await?;

        if !user.add_credential(credential) {
            tracing::warn!(user_id = %user.id, "Re-registered credential replaced in place");
        }
        self.persist_credentials(&user).await?;

        tracing::info!(
            user_id = %user.id,
            credentials = user.credentials.len(),
            "Registration completed"
        );
        Ok(user)
    }
}
