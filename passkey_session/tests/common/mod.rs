use std::sync::Arc;
use std::time::Duration;

use passkey_session::testing::FakeEngine;
use passkey_session::{
    CacheStoreConfig, CeremonyCoordinator, CeremonyStart, CoordinatorConfig, DataStoreConfig,
    DataStoreType, Stores,
};

/// SQLite in-memory stores with an in-memory cache, tables created by `init`.
pub async fn sqlite_stores() -> Stores {
    let data = DataStoreConfig::new(DataStoreType::Sqlite, "sqlite::memory:");
    passkey_session::init(&data, &CacheStoreConfig::memory())
        .await
        .expect("sqlite stores should initialize")
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        retry_backoff: Duration::ZERO,
        ..CoordinatorConfig::default()
    }
}

pub fn coordinator(stores: Stores, config: CoordinatorConfig) -> CeremonyCoordinator {
    CeremonyCoordinator::new(Arc::new(FakeEngine::new()), stores, config)
}

/// The client's answer to `start`.
pub fn answer(start: &CeremonyStart, credential_id: &str, sign_count: u32) -> Vec<u8> {
    FakeEngine::response(start, credential_id, sign_count)
}
