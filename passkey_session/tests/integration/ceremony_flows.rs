use passkey_session::{CloneWarningPolicy, CoordinationError, CoordinatorConfig};

use crate::common::{answer, coordinator, sqlite_stores, test_config};

#[tokio::test]
async fn test_register_then_login_over_sqlite() {
    // Given a coordinator on SQLite-backed stores
    let coordinator = coordinator(sqlite_stores().await, test_config());

    // When alice registers one passkey
    let start = coordinator.begin_registration("alice").await.unwrap();
    let user = coordinator
        .finish_registration(Some(&start.token), &answer(&start, "cred-1", 0))
        .await
        .unwrap();
    assert_eq!(user.credentials.len(), 1);

    // Then she can log in with it and the session resolves back to her
    let start = coordinator.begin_login("alice").await.unwrap();
    let outcome = coordinator
        .finish_login(Some(&start.token), &answer(&start, "cred-1", 7))
        .await
        .unwrap();
    assert!(!outcome.clone_warning);

    let me = coordinator
        .authenticated_user(Some(&outcome.session.token))
        .await
        .unwrap();
    assert_eq!(me.id, user.id);

    let summaries = coordinator
        .list_credentials(Some(&outcome.session.token))
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].sign_count, 7);
}

#[tokio::test]
async fn test_state_survives_coordinator_restart() {
    // Given stores shared by two coordinator instances
    let stores = sqlite_stores().await;
    let first = coordinator(stores.clone(), test_config());
    let start = first.begin_registration("alice").await.unwrap();

    // When a fresh coordinator finishes the ceremony the first one began
    let second = coordinator(stores, test_config());
    let user = second
        .finish_registration(Some(&start.token), &answer(&start, "cred-1", 0))
        .await
        .unwrap();

    // Then the credential is committed
    assert_eq!(user.name, "alice");
    assert_eq!(user.credentials.len(), 1);
}

#[tokio::test]
async fn test_login_updates_credential_in_place() {
    let coordinator = coordinator(sqlite_stores().await, test_config());
    let start = coordinator.begin_registration("alice").await.unwrap();
    coordinator
        .finish_registration(Some(&start.token), &answer(&start, "cred-1", 0))
        .await
        .unwrap();

    // Logging in rewrites the counter on the existing entry
    let start = coordinator.begin_login("alice").await.unwrap();
    let outcome = coordinator
        .finish_login(Some(&start.token), &answer(&start, "cred-1", 1))
        .await
        .unwrap();

    assert_eq!(outcome.user.credentials.len(), 1);
    assert_eq!(outcome.user.credentials[0].id, b"cred-1".to_vec());
}

#[tokio::test]
async fn test_expired_ceremony_is_refused_and_purged() {
    // Given ceremonies that expire as soon as they open
    let config = CoordinatorConfig {
        ceremony_ttl: 0,
        ..test_config()
    };
    let coordinator = coordinator(sqlite_stores().await, config);
    let start = coordinator.begin_registration("alice").await.unwrap();

    // When the client finishes late
    let err = coordinator
        .finish_registration(Some(&start.token), &answer(&start, "cred-1", 0))
        .await
        .unwrap_err();

    // Then the session is treated as missing
    assert_eq!(err, CoordinationError::SessionNotFound);
    assert_eq!(coordinator.purge_expired_ceremonies().await.unwrap(), 0);
}

#[tokio::test]
async fn test_abandoned_ceremony_is_purged() {
    let config = CoordinatorConfig {
        ceremony_ttl: 0,
        ..test_config()
    };
    let coordinator = coordinator(sqlite_stores().await, config);
    coordinator.begin_registration("alice").await.unwrap();
    coordinator.begin_registration("bob").await.unwrap();

    let purged = coordinator.purge_expired_ceremonies().await.unwrap();

    assert_eq!(purged, 2);
}

#[tokio::test]
async fn test_clone_warning_reject_policy() {
    // Given a coordinator that refuses cloned authenticators
    let config = CoordinatorConfig {
        clone_warning_policy: CloneWarningPolicy::Reject,
        ..test_config()
    };
    let coordinator = coordinator(sqlite_stores().await, config);
    let start = coordinator.begin_registration("alice").await.unwrap();
    coordinator
        .finish_registration(Some(&start.token), &answer(&start, "cred-1", 0))
        .await
        .unwrap();

    let start = coordinator.begin_login("alice").await.unwrap();
    coordinator
        .finish_login(Some(&start.token), &answer(&start, "cred-1", 10))
        .await
        .unwrap();

    // When the counter fails to advance
    let start = coordinator.begin_login("alice").await.unwrap();
    let err = coordinator
        .finish_login(Some(&start.token), &answer(&start, "cred-1", 10))
        .await
        .unwrap_err();

    // Then login is refused and the ceremony is consumed
    assert!(matches!(err, CoordinationError::CeremonyRejected(_)));
    let replay = coordinator
        .finish_login(Some(&start.token), &answer(&start, "cred-1", 11))
        .await
        .unwrap_err();
    assert_eq!(replay, CoordinationError::SessionNotFound);
}

#[tokio::test]
async fn test_new_login_revokes_previous_session() {
    let coordinator = coordinator(sqlite_stores().await, test_config());
    let start = coordinator.begin_registration("alice").await.unwrap();
    coordinator
        .finish_registration(Some(&start.token), &answer(&start, "cred-1", 0))
        .await
        .unwrap();

    let mut tokens = Vec::new();
    for count in 1..=2 {
        let start = coordinator.begin_login("alice").await.unwrap();
        let outcome = coordinator
            .finish_login(Some(&start.token), &answer(&start, "cred-1", count))
            .await
            .unwrap();
        tokens.push(outcome.session.token);
    }

    assert_eq!(
        coordinator
            .authenticated_user(Some(&tokens[0]))
            .await
            .unwrap_err(),
        CoordinationError::SessionNotFound
    );
    assert!(coordinator.authenticated_user(Some(&tokens[1])).await.is_ok());

    coordinator.logout(Some(&tokens[1])).await.unwrap();
    assert!(coordinator.authenticated_user(Some(&tokens[1])).await.is_err());
}
