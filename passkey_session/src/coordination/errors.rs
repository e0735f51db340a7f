//! Error types surfaced to callers of the coordinator

use thiserror::Error;

use crate::engine::EngineError;
use crate::storage::StoreError;
use crate::utils::UtilError;

/// Errors that can occur while running a ceremony or resolving a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// Malformed or missing request data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// No pending or authenticated session matches the presented token
    #[error("Session not found")]
    SessionNotFound,

    /// The engine refused the client response, or policy refused the login
    #[error("Ceremony rejected: {0}")]
    CeremonyRejected(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The random source failed; never retried
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),
}

impl CoordinationError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::InvalidInput(msg) => tracing::warn!("Invalid input: {}", msg),
            Self::AlreadyExists(msg) => tracing::info!("Already exists: {}", msg),
            Self::NotFound(msg) => tracing::info!("Not found: {}", msg),
            Self::SessionNotFound => tracing::info!("Session not found"),
            Self::CeremonyRejected(msg) => tracing::warn!("Ceremony rejected: {}", msg),
            Self::StorageUnavailable(msg) => tracing::error!("Storage unavailable: {}", msg),
            Self::EntropyUnavailable(msg) => tracing::error!("Entropy unavailable: {}", msg),
        }
        self
    }

    /// Message that is safe to return to an HTTP client
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::AlreadyExists(_) => "User already exists".to_string(),
            Self::NotFound(_) => "User not found".to_string(),
            Self::SessionNotFound => "Session not found".to_string(),
            Self::CeremonyRejected(_) => "Passkey verification failed".to_string(),
            Self::StorageUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::EntropyUnavailable(_) => "Internal server error".to_string(),
        }
    }
}

// Conversions log at the point the error crosses into the coordinator

impl From<StoreError> for CoordinationError {
    fn from(err: StoreError) -> Self {
        let error = match err {
            StoreError::AlreadyExists(msg) => Self::AlreadyExists(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => Self::StorageUnavailable(other.to_string()),
        };
        error.log()
    }
}

impl From<EngineError> for CoordinationError {
    fn from(err: EngineError) -> Self {
        Self::CeremonyRejected(err.to_string()).log()
    }
}

impl From<UtilError> for CoordinationError {
    fn from(err: UtilError) -> Self {
        Self::EntropyUnavailable(err.to_string()).log()
    }
}
