use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::storage::errors::StoreError;
use crate::storage::types::CacheData;

pub struct InMemoryCacheStore {
    pub(super) entry: Mutex<HashMap<String, (CacheData, Instant)>>,
}

pub struct RedisCacheStore {
    pub(super) client: redis::Client,
}

/// Key/value store with per-entry expiry, used for authenticated sessions.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Verify the backend is reachable.
    async fn init(&self) -> Result<(), StoreError>;

    /// Store a value that disappears after `ttl` seconds.
    async fn put_with_ttl(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: u64,
    ) -> Result<(), StoreError>;

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StoreError>;

    /// Removing an absent key is not an error.
    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StoreError>;
}
