use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{Router, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use passkey_session::{
    CoordinationError, CredentialSummary, get_cookie_value, header_clear_cookie,
    header_set_cookie,
};

use crate::error::{IntoResponseError, status_for};
use crate::session::{AppState, AuthUser, SessionUserView};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/registerStart", post(register_start))
        .route("/registerFinish", post(register_finish))
        .route("/loginStart", post(login_start))
        .route("/loginFinish", post(login_finish))
        .route("/session", get(current_session))
        .route("/credentials", get(list_credentials))
        .route("/logout", post(logout))
}

#[derive(Deserialize)]
struct UsernameRequest {
    username: String,
}

#[derive(Serialize)]
struct RegistrationResponse {
    name: String,
    credential_count: usize,
}

#[derive(Serialize)]
struct LoginResponse {
    user: SessionUserView,
    clone_warning: bool,
}

fn parse_username(body: &[u8]) -> Result<String, (StatusCode, String)> {
    serde_json::from_slice::<UsernameRequest>(body)
        .map(|req| req.username)
        .map_err(|e| {
            tracing::debug!("Malformed begin request: {}", e);
            CoordinationError::InvalidInput("request body must be JSON with a username".into())
        })
        .into_response_error()
}

fn session_token<'a>(
    headers: &'a HeaderMap,
    state: &AppState,
) -> Result<Option<&'a str>, (StatusCode, String)> {
    get_cookie_value(headers, &state.config.cookie_name).into_response_error()
}

fn set_session_cookie(
    state: &AppState,
    token: &str,
    max_age: u64,
) -> Result<HeaderMap, (StatusCode, String)> {
    let mut headers = HeaderMap::new();
    let max_age = i64::try_from(max_age).unwrap_or(i64::MAX);
    header_set_cookie(
        &mut headers,
        &state.config.cookie_name,
        token,
        &state.config.cookie_path,
        max_age,
    )
    .into_response_error()?;
    Ok(headers)
}

fn cleared_cookie(state: &AppState) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Err(e) =
        header_clear_cookie(&mut headers, &state.config.cookie_name, &state.config.cookie_path)
    {
        tracing::error!("Failed to clear session cookie: {}", e);
    }
    headers
}

/// A consumed ceremony leaves nothing behind the cookie, except when the
/// credential save failed and the client may retry the finish call.
fn ceremony_cookie_after(state: &AppState, err: Option<&CoordinationError>) -> HeaderMap {
    match err {
        Some(CoordinationError::StorageUnavailable(_)) => HeaderMap::new(),
        _ => cleared_cookie(state),
    }
}

async fn register_start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(HeaderMap, Json<Value>), (StatusCode, String)> {
    let username = parse_username(&body)?;

    let start = state
        .coordinator
        .begin_registration(&username)
        .await
        .into_response_error()?;

    let headers = set_session_cookie(&state, &start.token, start.max_age)?;
    Ok((headers, Json(start.options)))
}

async fn register_finish(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Bytes,
) -> (
    HeaderMap,
    Result<Json<RegistrationResponse>, (StatusCode, String)>,
) {
    let token = match session_token(&request_headers, &state) {
        Ok(token) => token,
        Err(e) => return (HeaderMap::new(), Err(e)),
    };

    let result = state.coordinator.finish_registration(token, &body).await;
    let headers = ceremony_cookie_after(&state, result.as_ref().err());

    let response = result
        .map(|user| {
            Json(RegistrationResponse {
                credential_count: user.credentials.len(),
                name: user.name,
            })
        })
        .into_response_error();

    (headers, response)
}

async fn login_start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(HeaderMap, Json<Value>), (StatusCode, String)> {
    let username = parse_username(&body)?;

    let start = state
        .coordinator
        .begin_login(&username)
        .await
        .into_response_error()?;

    let headers = set_session_cookie(&state, &start.token, start.max_age)?;
    Ok((headers, Json(start.options)))
}

async fn login_finish(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Bytes,
) -> (HeaderMap, Result<Json<LoginResponse>, (StatusCode, String)>) {
    let token = match session_token(&request_headers, &state) {
        Ok(token) => token,
        Err(e) => return (HeaderMap::new(), Err(e)),
    };

    match state.coordinator.finish_login(token, &body).await {
        Ok(outcome) => {
            // The authenticated session token replaces the ceremony token
            match set_session_cookie(&state, &outcome.session.token, outcome.session.ttl) {
                Ok(headers) => (
                    headers,
                    Ok(Json(LoginResponse {
                        user: SessionUserView::from(&outcome.user),
                        clone_warning: outcome.clone_warning,
                    })),
                ),
                Err(e) => (HeaderMap::new(), Err(e)),
            }
        }
        Err(e) => (
            ceremony_cookie_after(&state, Some(&e)),
            Err((status_for(&e), e.public_message())),
        ),
    }
}

async fn current_session(AuthUser(user): AuthUser) -> Json<SessionUserView> {
    Json(SessionUserView::from(&user))
}

async fn list_credentials(
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> Result<Json<Vec<CredentialSummary>>, (StatusCode, String)> {
    let token = session_token(&request_headers, &state)?;

    let credentials = state
        .coordinator
        .list_credentials(token)
        .await
        .into_response_error()?;

    Ok(Json(credentials))
}

async fn logout(
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> Result<(HeaderMap, StatusCode), (StatusCode, String)> {
    let token = session_token(&request_headers, &state)?;

    state.coordinator.logout(token).await.into_response_error()?;

    Ok((cleared_cookie(&state), StatusCode::NO_CONTENT))
}
