use serde::{Deserialize, Serialize};

/// Server-side location of a created upload (the tus upload URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadHandle {
    pub location: String,
}

impl UploadHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// A prior, possibly partial, transfer found by a fingerprint probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumableUpload {
    pub handle: UploadHandle,
    /// Bytes the endpoint has acknowledged for this upload.
    pub offset: u64,
    /// Total length declared when the upload was created, if reported.
    #[serde(default)]
    pub length: Option<u64>,
}

/// Classification of a failed upload, as reported in batch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NetworkError,
    ServerError,
    ConflictError,
    AuthError,
    ValidationError,
    RetriesExhausted,
    Cancelled,
    InternalError,
}

impl ErrorKind {
    /// Returns `true` for kinds the retry scheduler absorbs.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkError | ErrorKind::ServerError | ErrorKind::ConflictError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::ServerError => "ServerError",
            ErrorKind::ConflictError => "ConflictError",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::RetriesExhausted => "RetriesExhausted",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
