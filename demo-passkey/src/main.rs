use std::time::Duration;

use axum::routing::{Router, get};

use passkey_session::{
    CacheStoreConfig, CeremonyCoordinator, CoordinatorConfig, DataStoreConfig, WebauthnEngine,
};
use passkey_session_axum::{AppState, AuthUser, HttpConfig, passkey_session_router};

mod server;

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

async fn index(AuthUser(user): AuthUser) -> String {
    format!("Hello, {}!", user.display_name)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    server::init_tracing("demo_passkey");

    let stores =
        passkey_session::init(&DataStoreConfig::from_env()?, &CacheStoreConfig::from_env()?)
            .await?;
    let engine = WebauthnEngine::from_env()?;
    let coordinator =
        CeremonyCoordinator::new(std::sync::Arc::new(engine), stores, CoordinatorConfig::from_env()?);

    let http = HttpConfig::from_env();
    let prefix = http.route_prefix.clone();
    let state = AppState::new(coordinator, http);

    server::spawn_ceremony_sweeper(state.coordinator.clone(), SWEEP_INTERVAL);

    let app = Router::new()
        .route("/", get(index))
        .with_state(state.clone())
        .nest(&prefix, passkey_session_router(state));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Starting server on http://localhost:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
