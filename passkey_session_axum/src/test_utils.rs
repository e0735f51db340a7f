//! Router test fixtures: the core crate's fake ceremony engine over in-memory
//! stores and helpers for driving requests through `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, body::Body, http::Request, response::Response};
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use serde_json::{Value, json};
use tower::ServiceExt;

use passkey_session::testing::FakeEngine;
use passkey_session::{CeremonyCoordinator, CoordinatorConfig, Stores};

use crate::{AppState, HttpConfig, passkey_session_router_no_trace};

pub(crate) fn test_app() -> Router {
    let config = CoordinatorConfig {
        retry_backoff: Duration::ZERO,
        ..CoordinatorConfig::default()
    };
    let coordinator = CeremonyCoordinator::new(
        Arc::new(FakeEngine::new()),
        Stores::in_memory(),
        config,
    );
    passkey_session_router_no_trace(AppState::new(coordinator, HttpConfig::default()))
}

pub(crate) async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: impl Into<Body>,
) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = cookie {
        builder = builder.header(COOKIE, format!("sid={token}"));
    }
    app.clone()
        .oneshot(builder.body(body.into()).unwrap())
        .await
        .unwrap()
}

/// Value of the `sid` cookie the response sets, `Some("")` when it clears it.
pub(crate) fn set_cookie_token(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("sid="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}

pub(crate) async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub(crate) async fn text_body(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The client's answer to a begin response body.
pub(crate) fn answer(options: &Value, credential_id: &str, sign_count: u32) -> Vec<u8> {
    FakeEngine::answer(options, credential_id, sign_count)
}

/// Run a full registration, returning nothing but asserting success.
pub(crate) async fn register(app: &Router, name: &str, credential_id: &str) {
    let start = send(
        app,
        "POST",
        "/registerStart",
        None,
        json!({ "username": name }).to_string(),
    )
    .await;
    assert_eq!(start.status(), 200);
    let token = set_cookie_token(&start).unwrap();
    let options = json_body(start).await;

    let finish = send(
        app,
        "POST",
        "/registerFinish",
        Some(&token),
        answer(&options, credential_id, 0),
    )
    .await;
    assert_eq!(finish.status(), 200);
}

/// Run a full login and return the authenticated session token.
pub(crate) async fn login(app: &Router, name: &str, credential_id: &str, sign_count: u32) -> String {
    let start = send(
        app,
        "POST",
        "/loginStart",
        None,
        json!({ "username": name }).to_string(),
    )
    .await;
    assert_eq!(start.status(), 200);
    let token = set_cookie_token(&start).unwrap();
    let options = json_body(start).await;

    let finish = send(
        app,
        "POST",
        "/loginFinish",
        Some(&token),
        answer(&options, credential_id, sign_count),
    )
    .await;
    assert_eq!(finish.status(), 200);
    set_cookie_token(&finish).unwrap()
}
