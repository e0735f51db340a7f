use http::StatusCode;
use passkey_session::{CoordinationError, UtilError};

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

/// Status code a coordination failure is reported with
pub fn status_for(err: &CoordinationError) -> StatusCode {
    match err {
        CoordinationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoordinationError::AlreadyExists(_) => StatusCode::CONFLICT,
        CoordinationError::NotFound(_) => StatusCode::NOT_FOUND,
        CoordinationError::SessionNotFound => StatusCode::UNAUTHORIZED,
        CoordinationError::CeremonyRejected(_) => StatusCode::BAD_REQUEST,
        CoordinationError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoordinationError::EntropyUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl<T> IntoResponseError<T> for Result<T, CoordinationError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| (status_for(&e), e.public_message()))
    }
}

/// Cookie header problems are the client's fault, everything else is ours
impl<T> IntoResponseError<T> for Result<T, UtilError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| match e {
            UtilError::Cookie(msg) => {
                tracing::debug!("Rejecting request with bad cookie: {}", msg);
                (StatusCode::BAD_REQUEST, "Invalid cookie header".to_string())
            }
            other => {
                tracing::error!("Failed to build response: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        })
    }
}
