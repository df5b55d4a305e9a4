//! Upload error types.

use shelfdrop_protocol::{ErrorKind, ProtocolError};
use shelfdrop_transfer::TransferError;

/// Errors that end an upload session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("retries exhausted after {retries} retries: {last}")]
    RetriesExhausted { retries: usize, last: ProtocolError },

    #[error("cancelled")]
    Cancelled,

    #[error("upload task failed: {0}")]
    Task(String),
}

impl UploadError {
    /// Classification reported in the session's result slot.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Protocol(e) => e.kind(),
            UploadError::Transfer(e) => match e {
                TransferError::OffsetRegression { .. } | TransferError::OffsetOutOfRange { .. } => {
                    ErrorKind::ConflictError
                }
                TransferError::InvalidTransition { .. } => ErrorKind::InternalError,
                _ => ErrorKind::ValidationError,
            },
            UploadError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            UploadError::Cancelled => ErrorKind::Cancelled,
            UploadError::Task(_) => ErrorKind::InternalError,
        }
    }
}
