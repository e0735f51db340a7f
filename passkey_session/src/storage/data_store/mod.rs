mod config;
mod types;

pub use config::{DataStoreConfig, DataStoreType, TableNames};
pub use types::{DataStore, PostgresDataStore, SqliteDataStore};
