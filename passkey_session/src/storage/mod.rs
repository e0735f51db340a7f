mod cache_store;
mod data_store;
mod errors;
mod schema_validation;
mod types;

pub use cache_store::{
    CacheStore, CacheStoreConfig, CacheStoreType, InMemoryCacheStore, RedisCacheStore,
};
pub use data_store::{
    DataStore, DataStoreConfig, DataStoreType, PostgresDataStore, SqliteDataStore, TableNames,
};
pub use errors::StoreError;
pub use types::CacheData;

pub(crate) use schema_validation::{validate_postgres_table_schema, validate_sqlite_table_schema};
