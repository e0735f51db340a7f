//! Router for the passkey ceremony endpoints

use axum::Router;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::session::AppState;

/// Create the router for all passkey endpoints
///
/// Nest it under `HttpConfig::route_prefix` (default `/api/passkey`):
/// - POST {prefix}/registerStart, {prefix}/registerFinish
/// - POST {prefix}/loginStart, {prefix}/loginFinish
/// - GET {prefix}/session, {prefix}/credentials
/// - POST {prefix}/logout
pub fn passkey_session_router(state: AppState) -> Router {
    passkey_session_router_no_trace(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(
                DefaultMakeSpan::new()
                    .level(Level::INFO)
                    .include_headers(true),
            )
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
}

/// Same as `passkey_session_router()` but without the HTTP tracing middleware.
pub fn passkey_session_router_no_trace(state: AppState) -> Router {
    crate::passkey::router().with_state(state)
}
