use std::sync::Arc;

use axum::extract::FromRequestParts;
use http::{StatusCode, request::Parts};
use serde::Serialize;

use passkey_session::{CeremonyCoordinator, UserIdentity, get_cookie_value};

use crate::config::HttpConfig;
use crate::error::IntoResponseError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<CeremonyCoordinator>,
    pub config: Arc<HttpConfig>,
}

impl AppState {
    pub fn new(coordinator: CeremonyCoordinator, config: HttpConfig) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            config: Arc::new(config),
        }
    }
}

/// The user behind the request's authenticated session cookie.
///
/// Rejects with 401 when the cookie is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserIdentity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = get_cookie_value(&parts.headers, &state.config.cookie_name)
            .into_response_error()?;

        let user = state
            .coordinator
            .authenticated_user(token)
            .await
            .into_response_error()?;

        Ok(AuthUser(user))
    }
}

/// Public view of a signed-in user
#[derive(Debug, Serialize)]
pub struct SessionUserView {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub credential_count: usize,
}

impl From<&UserIdentity> for SessionUserView {
    fn from(user: &UserIdentity) -> Self {
        Self {
            id: user.id.to_base64url(),
            name: user.name.clone(),
            display_name: user.display_name.clone(),
            credential_count: user.credentials.len(),
        }
    }
}
