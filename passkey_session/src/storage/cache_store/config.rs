use std::{env, str::FromStr, sync::Arc};

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore};
use crate::storage::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStoreType {
    Memory,
    Redis,
}

impl FromStr for CacheStoreType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            t => Err(StoreError::Config(format!(
                "Unsupported cache store type: {t}. Supported types are 'memory' and 'redis'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStoreConfig {
    pub store_type: CacheStoreType,
    pub url: Option<String>,
}

impl CacheStoreConfig {
    pub fn memory() -> Self {
        Self {
            store_type: CacheStoreType::Memory,
            url: None,
        }
    }

    /// Read `GENERIC_CACHE_STORE_TYPE` (default `memory`) and `GENERIC_CACHE_STORE_URL`.
    pub fn from_env() -> Result<Self, StoreError> {
        let store_type: CacheStoreType = env::var("GENERIC_CACHE_STORE_TYPE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let url = env::var("GENERIC_CACHE_STORE_URL").ok();
        if store_type == CacheStoreType::Redis && url.is_none() {
            return Err(StoreError::Config(
                "GENERIC_CACHE_STORE_URL must be set for the redis cache store".to_string(),
            ));
        }

        Ok(Self { store_type, url })
    }

    /// Open the configured store and verify it is reachable.
    pub async fn connect(&self) -> Result<Arc<dyn CacheStore>, StoreError> {
        tracing::info!(
            "Initializing cache store with type: {:?}, url: {:?}",
            self.store_type,
            self.url
        );

        let store: Arc<dyn CacheStore> = match self.store_type {
            CacheStoreType::Memory => Arc::new(InMemoryCacheStore::new()),
            CacheStoreType::Redis => {
                let url = self.url.as_deref().ok_or_else(|| {
                    StoreError::Config("Redis cache store requires a URL".to_string())
                })?;
                let client = redis::Client::open(url).map_err(|e| {
                    tracing::error!("Failed to create Redis client: {}", e);
                    StoreError::Config(e.to_string())
                })?;
                Arc::new(RedisCacheStore::new(client))
            }
        };

        store.init().await.inspect_err(|e| {
            tracing::error!("Failed to connect to cache store: {}", e);
        })?;

        tracing::info!("Connected to cache store: type={:?}", self.store_type);
        Ok(store)
    }
}
