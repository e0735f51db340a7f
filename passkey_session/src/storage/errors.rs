use thiserror::Error;

/// Errors surfaced by the credential, ceremony session and cache stores.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The addressed row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store could not be reached or failed the operation
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::AlreadyExists(db_err.message().to_string())
            }
            sqlx::Error::Configuration(_) => Self::Config(err.to_string()),
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
