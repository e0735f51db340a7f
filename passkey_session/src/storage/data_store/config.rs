//! Database connection and table configuration

use std::{env, str::FromStr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::types::{DataStore, PostgresDataStore, SqliteDataStore};
use crate::storage::errors::StoreError;

const DEFAULT_TABLE_PREFIX: &str = "psk_";

/// Backend selected by `GENERIC_DATA_STORE_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStoreType {
    Sqlite,
    Postgres,
    /// Process-local maps, nothing survives a restart
    Memory,
}

impl FromStr for DataStoreType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            t => Err(StoreError::Config(format!(
                "Unsupported store type: {t}. Supported types are 'sqlite', 'postgres' and 'memory'"
            ))),
        }
    }
}

/// Connection settings for the credential and ceremony session tables
#[derive(Debug, Clone)]
pub struct DataStoreConfig {
    pub store_type: DataStoreType,
    pub url: String,
    pub table_prefix: String,
}

impl DataStoreConfig {
    pub fn new(store_type: DataStoreType, url: impl Into<String>) -> Self {
        Self {
            store_type,
            url: url.into(),
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
        }
    }

    /// Read `GENERIC_DATA_STORE_TYPE`, `GENERIC_DATA_STORE_URL` and `DB_TABLE_PREFIX`.
    pub fn from_env() -> Result<Self, StoreError> {
        let store_type: DataStoreType = env::var("GENERIC_DATA_STORE_TYPE")
            .map_err(|_| StoreError::Config("GENERIC_DATA_STORE_TYPE must be set".to_string()))?
            .parse()?;

        let url = match store_type {
            DataStoreType::Memory => env::var("GENERIC_DATA_STORE_URL").unwrap_or_default(),
            _ => env::var("GENERIC_DATA_STORE_URL").map_err(|_| {
                StoreError::Config("GENERIC_DATA_STORE_URL must be set".to_string())
            })?,
        };

        let table_prefix =
            env::var("DB_TABLE_PREFIX").unwrap_or_else(|_| DEFAULT_TABLE_PREFIX.to_string());

        Ok(Self {
            store_type,
            url,
            table_prefix,
        })
    }

    pub fn table_names(&self) -> TableNames {
        TableNames::with_prefix(&self.table_prefix)
    }

    /// Build a lazily connecting pool for the configured backend.
    ///
    /// Returns `None` for the in-memory backend, which has no pool.
    pub fn connect(&self) -> Result<Option<Arc<dyn DataStore>>, StoreError> {
        tracing::info!(
            "Initializing data store with type: {:?}, url: {}",
            self.store_type,
            self.url
        );

        let store: Arc<dyn DataStore> = match self.store_type {
            DataStoreType::Memory => return Ok(None),
            DataStoreType::Sqlite => {
                let opts = SqliteConnectOptions::from_str(&self.url)?
                    .create_if_missing(true)
                    .foreign_keys(true);

                // Every connection to an in-memory database sees its own empty database,
                // so keep exactly one connection alive for the life of the pool.
                let pool_opts = if self.url.contains(":memory:") {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None::<Duration>)
                        .max_lifetime(None::<Duration>)
                } else {
                    SqlitePoolOptions::new()
                };

                Arc::new(SqliteDataStore::new(pool_opts.connect_lazy_with(opts)))
            }
            DataStoreType::Postgres => Arc::new(PostgresDataStore::new(
                PgPoolOptions::new().connect_lazy(&self.url)?,
            )),
        };

        Ok(Some(store))
    }
}

/// Resolved table names, all sharing one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub users: String,
    pub sessions: String,
}

impl TableNames {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            users: format!("{prefix}users"),
            sessions: format!("{prefix}sessions"),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_TABLE_PREFIX)
    }
}
