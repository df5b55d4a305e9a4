//! Protocol-level errors.

use crate::types::ErrorKind;

/// Failure of a single wire operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("offset conflict: {0}")]
    Conflict(String),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl ProtocolError {
    /// Maps a non-success HTTP status to an error.
    ///
    /// 401/403 are auth failures, 409/412 offset conflicts, 429 and 5xx
    /// server errors; any other status is treated as a rejected request.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => ProtocolError::Auth(format!("status {status}: {body}")),
            409 | 412 => ProtocolError::Conflict(format!("status {status}: {body}")),
            429 | 500..=599 => ProtocolError::Server { status, body },
            _ => ProtocolError::Validation(format!("status {status}: {body}")),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Network(_) => ErrorKind::NetworkError,
            ProtocolError::Server { .. } => ErrorKind::ServerError,
            ProtocolError::Conflict(_) => ErrorKind::ConflictError,
            ProtocolError::Auth(_) => ErrorKind::AuthError,
            ProtocolError::Validation(_) => ErrorKind::ValidationError,
        }
    }

    /// Returns `true` if the operation may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
