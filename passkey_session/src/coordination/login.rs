use serde::Serialize;

use crate::config::CloneWarningPolicy;
use crate::session::{AuthSession, CeremonySession};
use crate::userdb::UserIdentity;
use crate::utils::base64url_encode;

use super::coordinator::{CeremonyCoordinator, CeremonyStart, validate_username};
use super::errors::CoordinationError;

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: UserIdentity,
    pub session: AuthSession,
    /// The authenticator's counter did not advance
    pub clone_warning: bool,
}

impl CeremonyCoordinator {
    /// Open a login ceremony for an existing user.
    #[tracing::instrument(skip(self))]
    pub async fn begin_login(&self, username: &str) -> Result<CeremonyStart, CoordinationError> {
        let name = validate_username(username)?;
        let user = self.users.get_user_by_name(name).await?;
        let challenge = self.engine.begin_login(&user).await?;

        self.open_ceremony(&user, challenge).await
    }

    /// Verify the assertion for a pending login and issue an authenticated session.
    ///
    /// The authenticated session is minted before the counter is written, and
    /// withdrawn again if that write fails, so a storage failure on either
    /// step leaves the ceremony pending for another finish.
    #[tracing::instrument(skip(self, token, response))]
    pub async fn finish_login(
        &self,
        token: Option<&str>,
        response: &[u8],
    ) -> Result<LoginOutcome, CoordinationError> {
        let session = self.take_pending(token).await?;
        let result = self.complete_login(&session, response).await;
        self.release_on_failure(&session, result).await
    }

    async fn complete_login(
        &self,
        session: &CeremonySession,
        response: &[u8],
    ) -> Result<LoginOutcome, CoordinationError> {
        let mut user = self.resolve_owner(session).await?;
        let credential = self
            .engine
            .finish_login(&user, &session.state, response)
            .await?;

        let clone_warning = credential.clone_warning();
        if clone_warning {
            tracing::warn!(
                user_id = %user.id,
                credential_id = %base64url_encode(&credential.id),
                sign_count = credential.authenticator.sign_count,
                policy = %self.config.clone_warning_policy,
                "Authenticator clone warning"
            );
            if self.config.clone_warning_policy == CloneWarningPolicy::Reject {
                return Err(CoordinationError::CeremonyRejected(
                    "authenticator clone warning".to_string(),
                )
                .log());
            }
        }

        let auth_token = self.tokens.generate()?;
        let auth_session = self
            .auth_sessions
            .create(&auth_token, &user.id, self.config.auth_session_ttl)
            .await?;

        if user.update_credential(credential) {
            if let Err(e) = self.persist_credentials(&user).await {
                if let Err(remove_err) = self.auth_sessions.remove(&auth_token).await {
                    tracing::error!(
                        user_id = %user.id,
                        error = %remove_err,
                        "Failed to withdraw authenticated session"
                    );
                }
                return Err(e);
            }
        } else {
            tracing::warn!(user_id = %user.id, "Asserted credential is not registered to the user");
        }

        tracing::info!(user_id = %user.id, clone_warning, "Login completed");
        Ok(LoginOutcome {
            user,
            session: auth_session,
            clone_warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Stores;
    use crate::test_utils::{
        FakeEngine, FlakyCacheStore, coordinator_with, fast_config, logged_in, registered,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_begin_login_unknown_user_is_not_found() {
        let coordinator = coordinator_with(FakeEngine::new(), Stores::in_memory(), fast_config());

        let err = coordinator.begin_login("nobody").await.unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_login_updates_counter_without_duplicating() {
        // Given a user with one registered credential
        let coordinator = coordinator_with(FakeEngine::new(), Stores::in_memory(), fast_config());
        registered(&coordinator, "alice", "cred-a").await;

        // When logging in twice with advancing counters
        for count in [5, 9] {
            let start = coordinator.begin_login("alice").await.unwrap();
            let outcome = coordinator
                .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-a", count))
                .await
                .unwrap();
            assert!(!outcome.clone_warning);
        }

        // Then exactly one entry exists, carrying the last counter
        let start = coordinator.begin_login("alice").await.unwrap();
        let outcome = coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-a", 12))
            .await
            .unwrap();
        assert_eq!(outcome.user.credentials.len(), 1);
        assert_eq!(outcome.user.credentials[0].id, b"cred-a".to_vec());
        assert_eq!(outcome.user.credentials[0].authenticator.sign_count, 12);
    }

    #[tokio::test]
    async fn test_login_leaves_one_live_auth_session() {
        let coordinator = coordinator_with(FakeEngine::new(), Stores::in_memory(), fast_config());
        registered(&coordinator, "bob", "cred-b").await;

        let mut tokens = Vec::new();
        for count in [1, 2] {
            let start = coordinator.begin_login("bob").await.unwrap();
            let outcome = coordinator
                .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-b", count))
                .await
                .unwrap();
            tokens.push(outcome.session.token);
        }

        // Only the newest session resolves
        assert_eq!(
            coordinator.authenticated_user(Some(&tokens[0])).await.unwrap_err(),
            CoordinationError::SessionNotFound
        );
        let user = coordinator.authenticated_user(Some(&tokens[1])).await.unwrap();
        assert_eq!(user.name, "bob");
    }

    #[tokio::test]
    async fn test_concurrent_begin_login_only_latest_finishes() {
        let coordinator = coordinator_with(FakeEngine::new(), Stores::in_memory(), fast_config());
        registered(&coordinator, "carol", "cred-c").await;

        // Given two concurrent login begins
        let (a, b) = tokio::join!(
            coordinator.begin_login("carol"),
            coordinator.begin_login("carol")
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.token, b.token);
        assert_ne!(a.options, b.options);

        // When both are finished
        let ra = coordinator
            .finish_login(Some(&a.token), &FakeEngine::response(&a, "cred-c", 1))
            .await;
        let rb = coordinator
            .finish_login(Some(&b.token), &FakeEngine::response(&b, "cred-c", 2))
            .await;

        // Then exactly one succeeds and the other lost its session
        let results = [ra, rb];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(CoordinationError::SessionNotFound)))
        );
    }

    #[tokio::test]
    async fn test_clone_warning_is_allowed_under_warn_policy() {
        let coordinator = coordinator_with(FakeEngine::new(), Stores::in_memory(), fast_config());
        registered(&coordinator, "dave", "cred-d").await;

        let start = coordinator.begin_login("dave").await.unwrap();
        coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-d", 10))
            .await
            .unwrap();

        // When the counter goes backwards
        let start = coordinator.begin_login("dave").await.unwrap();
        let outcome = coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-d", 3))
            .await
            .unwrap();

        // Then login proceeds with the warning recorded
        assert!(outcome.clone_warning);
        assert!(outcome.user.credentials[0].authenticator.clone_warning);
    }

    #[tokio::test]
    async fn test_clone_warning_is_rejected_under_reject_policy() {
        let stores = Stores::in_memory();
        let sessions = stores.sessions.clone();
        let mut config = fast_config();
        config.clone_warning_policy = CloneWarningPolicy::Reject;
        let coordinator = coordinator_with(FakeEngine::new(), stores, config);
        registered(&coordinator, "erin", "cred-e").await;

        let start = coordinator.begin_login("erin").await.unwrap();
        coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-e", 4))
            .await
            .unwrap();

        let start = coordinator.begin_login("erin").await.unwrap();
        let err = coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-e", 4))
            .await
            .unwrap_err();

        assert!(matches!(err, CoordinationError::CeremonyRejected(_)));
        assert!(sessions.fetch(&start.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_credential_is_rejected() {
        let stores = Stores::in_memory();
        let sessions = stores.sessions.clone();
        let coordinator = coordinator_with(FakeEngine::new(), stores, fast_config());
        registered(&coordinator, "frank", "cred-f").await;

        let start = coordinator.begin_login("frank").await.unwrap();
        let err = coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "other", 1))
            .await
            .unwrap_err();

        // The engine's rejection consumes the ceremony
        assert!(matches!(err, CoordinationError::CeremonyRejected(_)));
        assert!(sessions.fetch(&start.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_login_with_stale_token_has_no_side_effects() {
        // Given a user who has logged in once
        let stores = Stores::in_memory();
        let users = stores.credentials.clone();
        let coordinator = coordinator_with(FakeEngine::new(), stores, fast_config());
        let user = registered(&coordinator, "gail", "cred-g").await;
        let start = coordinator.begin_login("gail").await.unwrap();
        let response = FakeEngine::response(&start, "cred-g", 5);

        // When finishing with a token that was never issued
        let err = coordinator
            .finish_login(Some("never-issued"), &response)
            .await
            .unwrap_err();

        // Then nothing is written and no session is minted
        assert_eq!(err, CoordinationError::SessionNotFound);
        let stored = users.get_user_by_name("gail").await.unwrap();
        assert_eq!(stored.credentials[0].authenticator.sign_count, 0);
        assert!(
            coordinator
                .auth_sessions
                .live_session_for(&user.id)
                .await
                .unwrap()
                .is_none()
        );

        // When the real token is finished and then replayed with a higher counter
        let outcome = coordinator
            .finish_login(Some(&start.token), &response)
            .await
            .unwrap();
        let err = coordinator
            .finish_login(
                Some(&start.token),
                &FakeEngine::response(&start, "cred-g", 9),
            )
            .await
            .unwrap_err();

        // Then the replay changes neither the counter nor the live session
        assert_eq!(err, CoordinationError::SessionNotFound);
        let stored = users.get_user_by_name("gail").await.unwrap();
        assert_eq!(stored.credentials[0].authenticator.sign_count, 5);
        let live = coordinator
            .auth_sessions
            .live_session_for(&user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.token, outcome.session.token);
    }

    #[tokio::test]
    async fn test_concurrent_finishes_on_one_token_issue_one_session() {
        // Given a pending login on SQLite
        let stores = crate::test_utils::sqlite_memory_stores().await;
        let coordinator = coordinator_with(FakeEngine::new(), stores, fast_config());
        registered(&coordinator, "ivan", "cred-i").await;
        let start = coordinator.begin_login("ivan").await.unwrap();
        let response = FakeEngine::response(&start, "cred-i", 1);

        // When two finishes race on the same token
        let (a, b) = tokio::join!(
            coordinator.finish_login(Some(&start.token), &response),
            coordinator.finish_login(Some(&start.token), &response)
        );

        // Then exactly one succeeds and the other finds no session
        let winner = match (a, b) {
            (Ok(outcome), Err(e)) | (Err(e), Ok(outcome)) => {
                assert_eq!(e, CoordinationError::SessionNotFound);
                outcome
            }
            (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
        };

        // And the winner's session is the one that resolves
        let user = coordinator
            .authenticated_user(Some(&winner.session.token))
            .await
            .unwrap();
        assert_eq!(user.name, "ivan");
    }

    #[tokio::test]
    async fn test_session_mint_failure_keeps_ceremony_and_counter() {
        // Given a cache that rejects the next write
        let flaky = Arc::new(FlakyCacheStore::new(0));
        let stores = Stores {
            cache: flaky.clone(),
            ..Stores::in_memory()
        };
        let (users, sessions) = (stores.credentials.clone(), stores.sessions.clone());
        let coordinator = coordinator_with(FakeEngine::new(), stores, fast_config());
        registered(&coordinator, "jade", "cred-j").await;
        let start = coordinator.begin_login("jade").await.unwrap();
        let response = FakeEngine::response(&start, "cred-j", 4);
        flaky.fail_next(1);

        // When the authenticated session cannot be stored
        let err = coordinator
            .finish_login(Some(&start.token), &response)
            .await
            .unwrap_err();

        // Then the ceremony is still pending and the counter untouched
        assert!(matches!(err, CoordinationError::StorageUnavailable(_)));
        assert!(sessions.fetch(&start.token).await.unwrap().is_some());
        let stored = users.get_user_by_name("jade").await.unwrap();
        assert_eq!(stored.credentials[0].authenticator.sign_count, 0);

        // And the same answer finishes once the cache recovers
        let outcome = coordinator
            .finish_login(Some(&start.token), &response)
            .await
            .unwrap();
        assert!(!outcome.clone_warning);
        assert_eq!(outcome.user.credentials[0].authenticator.sign_count, 4);
        assert!(
            coordinator
                .authenticated_user(Some(&outcome.session.token))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_counter_write_failure_withdraws_session() {
        // Given a credential store that fails every save during login
        let flaky = Arc::new(crate::test_utils::FlakyCredentialStore::new(0));
        let stores = Stores {
            credentials: flaky.clone(),
            ..Stores::in_memory()
        };
        let sessions = stores.sessions.clone();
        let coordinator = coordinator_with(FakeEngine::new(), stores, fast_config());
        let user = registered(&coordinator, "kurt", "cred-k").await;
        let previous = logged_in(&coordinator, "kurt", "cred-k", 1).await;
        let start = coordinator.begin_login("kurt").await.unwrap();
        flaky.fail_next(3);

        // When the counter cannot be written
        let err = coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-k", 2))
            .await
            .unwrap_err();

        // Then no authenticated session is left and the ceremony is pending
        assert!(matches!(err, CoordinationError::StorageUnavailable(_)));
        assert!(sessions.fetch(&start.token).await.unwrap().is_some());
        assert!(
            coordinator
                .auth_sessions
                .live_session_for(&user.id)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            coordinator.authenticated_user(Some(&previous)).await.unwrap_err(),
            CoordinationError::SessionNotFound
        );
    }

    #[tokio::test]
    async fn test_registration_token_cannot_finish_login() {
        let coordinator = coordinator_with(FakeEngine::new(), Stores::in_memory(), fast_config());
        let start = coordinator.begin_registration("gina").await.unwrap();

        let err = coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "x", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, CoordinationError::CeremonyRejected(_)));
    }

    #[tokio::test]
    async fn test_login_on_sqlite() {
        let stores = crate::test_utils::sqlite_memory_stores().await;
        let coordinator = coordinator_with(FakeEngine::new(), stores, fast_config());
        registered(&coordinator, "hank", "cred-h").await;

        let start = coordinator.begin_login("hank").await.unwrap();
        let outcome = coordinator
            .finish_login(Some(&start.token), &FakeEngine::response(&start, "cred-h", 3))
            .await
            .unwrap();

        assert_eq!(outcome.user.credentials[0].authenticator.sign_count, 3);
        assert_eq!(outcome.session.user_id, outcome.user.id);
    }
}
