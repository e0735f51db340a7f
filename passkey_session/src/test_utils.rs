//! Shared fixtures for unit tests: failing collaborators and SQLite-backed
//! stores. The ceremony engine lives in `crate::testing`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Sqlite, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::CoordinatorConfig;
use crate::coordination::CeremonyCoordinator;
use crate::session::{CeremonySession, CeremonyState, SqlSessionStore};
use crate::storage::{
    CacheData, CacheStore, CacheStoreConfig, DataStoreConfig, DataStoreType, InMemoryCacheStore,
    StoreError,
};
use crate::token::TokenGenerator;
use crate::userdb::{CredentialStore, InMemoryCredentialStore, SqlUserStore, UserId, UserIdentity};
use crate::utils::UtilError;
use crate::{Stores, init};

pub(crate) use crate::testing::FakeEngine;

pub(crate) struct FailingTokenGenerator;

impl TokenGenerator for FailingTokenGenerator {
    fn generate(&self) -> Result<String, UtilError> {
        Err(UtilError::Crypto("random source unavailable".to_string()))
    }
}

/// Fails the first `failures` credential saves with a storage error.
pub(crate) struct FlakyCredentialStore {
    inner: InMemoryCredentialStore,
    failures_left: AtomicU32,
    save_calls: AtomicU32,
}

impl FlakyCredentialStore {
    pub(crate) fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryCredentialStore::new(),
            failures_left: AtomicU32::new(failures),
            save_calls: AtomicU32::new(0),
        }
    }

    /// Fail the next `failures` saves
    pub(crate) fn fail_next(&self, failures: u32) {
        self.failures_left.store(failures, Ordering::SeqCst);
    }

    pub(crate) fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for FlakyCredentialStore {
    async fn create_user(&self, name: &str) -> Result<UserIdentity, StoreError> {
        self.inner.create_user(name).await
    }

    async fn get_user_by_name(&self, name: &str) -> Result<UserIdentity, StoreError> {
        self.inner.get_user_by_name(name).await
    }

    async fn get_user_by_credential_owner(&self, id: &UserId) -> Result<UserIdentity, StoreError> {
        self.inner.get_user_by_credential_owner(id).await
    }

    async fn save_credentials(&self, user: &UserIdentity) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Storage("simulated outage".to_string()));
        }
        self.inner.save_credentials(user).await
    }
}

/// Fails the first `failures` cache writes with a storage error.
pub(crate) struct FlakyCacheStore {
    inner: InMemoryCacheStore,
    failures_left: AtomicU32,
}

impl FlakyCacheStore {
    pub(crate) fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryCacheStore::new(),
            failures_left: AtomicU32::new(failures),
        }
    }

    /// Fail the next `failures` writes
    pub(crate) fn fail_next(&self, failures: u32) {
        self.failures_left.store(failures, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for FlakyCacheStore {
    async fn init(&self) -> Result<(), StoreError> {
        self.inner.init().await
    }

    async fn put_with_ttl(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: u64,
    ) -> Result<(), StoreError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Storage("simulated cache outage".to_string()));
        }
        self.inner.put_with_ttl(prefix, key, value, ttl).await
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StoreError> {
        self.inner.get(prefix, key).await
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StoreError> {
        self.inner.remove(prefix, key).await
    }
}

/// Single-connection pool so every query sees the same in-memory database
pub(crate) async fn sqlite_memory_pool() -> Pool<Sqlite> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<std::time::Duration>)
        .max_lifetime(None::<std::time::Duration>)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

fn sqlite_memory_config() -> DataStoreConfig {
    DataStoreConfig::new(DataStoreType::Sqlite, "sqlite::memory:")
}

/// Initialized user and session stores sharing one in-memory database
pub(crate) async fn sqlite_stores() -> (SqlUserStore, SqlSessionStore) {
    let config = sqlite_memory_config();
    let store = config.connect().unwrap().unwrap();

    let users = SqlUserStore::new(store.clone(), config.table_names());
    users.init().await.unwrap();
    let sessions = SqlSessionStore::new(store, config.table_names());
    sessions.init().await.unwrap();

    (users, sessions)
}

pub(crate) async fn sqlite_user_store() -> SqlUserStore {
    sqlite_stores().await.0
}

pub(crate) async fn sqlite_memory_stores() -> Stores {
    init(&sqlite_memory_config(), &CacheStoreConfig::memory())
        .await
        .unwrap()
}

pub(crate) fn ceremony_session(token: &str, owner: &UserId, ttl: Duration) -> CeremonySession {
    CeremonySession {
        token: token.to_string(),
        owner: owner.clone(),
        state: CeremonyState(serde_json::json!({ "challenge": token })),
        expires_at: Utc::now() + ttl,
    }
}

/// Default settings without retry delays
pub(crate) fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        retry_backoff: std::time::Duration::ZERO,
        ..CoordinatorConfig::default()
    }
}

pub(crate) fn coordinator_with(
    engine: FakeEngine,
    stores: Stores,
    config: CoordinatorConfig,
) -> CeremonyCoordinator {
    CeremonyCoordinator::new(Arc::new(engine), stores, config)
}

/// Register `name` with one credential
pub(crate) async fn registered(
    coordinator: &CeremonyCoordinator,
    name: &str,
    credential_id: &str,
) -> UserIdentity {
    let start = coordinator.begin_registration(name).await.unwrap();
    coordinator
        .finish_registration(
            Some(&start.token),
            &FakeEngine::response(&start, credential_id, 0),
        )
        .await
        .unwrap()
}

/// Log `name` in and return the authenticated session token
pub(crate) async fn logged_in(
    coordinator: &CeremonyCoordinator,
    name: &str,
    credential_id: &str,
    sign_count: u32,
) -> String {
    let start = coordinator.begin_login(name).await.unwrap();
    coordinator
        .finish_login(
            Some(&start.token),
            &FakeEngine::response(&start, credential_id, sign_count),
        )
        .await
        .unwrap()
        .session
        .token
}
