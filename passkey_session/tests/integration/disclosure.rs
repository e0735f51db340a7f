use passkey_session::CoordinationError;

use crate::common::{answer, coordinator, sqlite_stores, test_config};

#[tokio::test]
async fn test_rejection_messages_do_not_echo_engine_details() {
    // Given a registration answered with a wrong challenge
    let coordinator = coordinator(sqlite_stores().await, test_config());
    let start = coordinator.begin_registration("alice").await.unwrap();

    let err = coordinator
        .finish_registration(
            Some(&start.token),
            br#"{"challenge":"registration-999","credential_id":"x"}"#,
        )
        .await
        .unwrap_err();

    // Then callers only see a generic message
    assert!(matches!(err, CoordinationError::CeremonyRejected(_)));
    assert_eq!(err.public_message(), "Passkey verification failed");
    assert!(!err.public_message().contains("challenge"));
}

#[tokio::test]
async fn test_session_errors_look_the_same_for_missing_and_unknown_tokens() {
    let coordinator = coordinator(sqlite_stores().await, test_config());

    let missing = coordinator.finish_login(None, b"{}").await.unwrap_err();
    let unknown = coordinator
        .finish_login(Some("not-a-real-token"), b"{}")
        .await
        .unwrap_err();

    assert_eq!(missing, unknown);
    assert_eq!(missing.public_message(), unknown.public_message());
}

#[tokio::test]
async fn test_registration_token_cannot_finish_login() {
    let coordinator = coordinator(sqlite_stores().await, test_config());
    let start = coordinator.begin_registration("alice").await.unwrap();

    let err = coordinator
        .finish_login(Some(&start.token), &answer(&start, "cred-1", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinationError::CeremonyRejected(_)));
}
