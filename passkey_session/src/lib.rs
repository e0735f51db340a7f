//! passkey_session - ceremony session lifecycle and credential-store
//! coordination for passkey registration and login
//!
//! The cryptographic ceremony itself is delegated to a [`CeremonyEngine`];
//! this crate mints session tokens, keeps in-flight ceremony state between the
//! begin and finish round-trips, binds it to a user and commits credentials.

mod config;
mod coordination;
mod engine;
mod session;
mod storage;
mod token;
mod userdb;
mod utils;

#[cfg(test)]
mod test_utils;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::sync::Arc;

pub use config::{CloneWarningPolicy, ConfigError, CoordinatorConfig};
pub use coordination::{CeremonyCoordinator, CeremonyStart, CoordinationError, LoginOutcome};
#[cfg(feature = "webauthn")]
pub use engine::WebauthnEngine;
pub use engine::{CeremonyChallenge, CeremonyEngine, EngineError, counter_suggests_clone};
pub use session::{
    AuthSession, AuthSessionStore, CeremonySession, CeremonyState, InMemorySessionStore,
    SessionStore, SqlSessionStore,
};
pub use storage::{
    CacheData, CacheStore, CacheStoreConfig, CacheStoreType, DataStore, DataStoreConfig,
    DataStoreType, InMemoryCacheStore, StoreError, TableNames,
};
pub use token::{RandomTokenGenerator, SESSION_TOKEN_BYTES, TokenGenerator};
pub use userdb::{
    Authenticator, Credential, CredentialFlags, CredentialStore, CredentialSummary,
    InMemoryCredentialStore, SqlUserStore, UserId, UserIdentity,
};
pub use utils::{UtilError, get_cookie_value, header_clear_cookie, header_set_cookie};

/// The stores a [`CeremonyCoordinator`] runs on
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub cache: Arc<dyn CacheStore>,
}

impl Stores {
    /// Process-local stores; nothing survives a restart
    pub fn in_memory() -> Self {
        Self {
            credentials: Arc::new(InMemoryCredentialStore::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
            cache: Arc::new(InMemoryCacheStore::new()),
        }
    }
}

/// Connect the configured backends, creating and validating tables.
pub async fn init(data: &DataStoreConfig, cache: &CacheStoreConfig) -> Result<Stores, StoreError> {
    let cache = cache.connect().await?;

    let Some(store) = data.connect()? else {
        tracing::info!("Using in-memory credential and session stores");
        return Ok(Stores {
            cache,
            ..Stores::in_memory()
        });
    };

    let tables = data.table_names();
    let users = SqlUserStore::new(store.clone(), tables.clone());
    users.init().await?;
    let sessions = SqlSessionStore::new(store, tables);
    sessions.init().await?;

    tracing::info!(
        "Data store initialized: type={:?}, prefix={}",
        data.store_type,
        data.table_prefix
    );

    Ok(Stores {
        credentials: Arc::new(users),
        sessions: Arc::new(sessions),
        cache,
    })
}
