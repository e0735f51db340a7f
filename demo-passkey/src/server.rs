use std::sync::Arc;
use std::time::Duration;

use passkey_session::CeremonyCoordinator;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub(crate) fn init_tracing(app_name: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            format!("passkey_session_axum=debug,passkey_session=debug,{app_name}=debug,info")
                .into()
        }

        #[cfg(not(debug_assertions))]
        {
            "info".into()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("You can increase verbosity by setting the RUST_LOG environment variable.");
}

/// Periodically drop ceremony sessions that were started and never finished.
pub(crate) fn spawn_ceremony_sweeper(
    coordinator: Arc<CeremonyCoordinator>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match coordinator.purge_expired_ceremonies().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("Purged {} expired ceremony sessions", n),
                Err(e) => tracing::warn!("Ceremony sweep failed: {}", e),
            }
        }
    })
}
