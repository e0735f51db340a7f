use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// The client response failed verification
    #[error("Ceremony rejected: {0}")]
    Rejected(String),

    /// The stored ceremony state could not be used
    #[error("Invalid ceremony state: {0}")]
    State(String),

    #[error("Engine configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(err.to_string())
    }
}
