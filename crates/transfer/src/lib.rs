//! Client-side building blocks for resumable uploads.
//!
//! - [`ChunkPlan`] splits a payload into fixed-size byte ranges.
//! - [`fingerprint`] derives the identity used to find a prior transfer.
//! - [`RetrySchedule`] holds the fixed backoff sequence.
//! - [`UploadSession`] records one asset's transfer state.

mod asset;
mod chunked;
mod fingerprint;
mod naming;
mod retry;
mod session;

pub use asset::{Asset, Payload};
pub use chunked::{Chunk, ChunkPlan, ChunkRanges};
pub use fingerprint::{Fingerprint, fingerprint};
pub use naming::{content_type_for, file_extension, file_name, object_name_for};
pub use retry::{Backoff, DEFAULT_RETRY_DELAYS_MS, RetrySchedule};
pub use session::{SessionState, UploadSession};

/// Default chunk size: 6 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 6 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    #[error("offset {offset} is beyond total length {total}")]
    OffsetOutOfRange { offset: u64, total: u64 },

    #[error("acknowledged offset went backwards: {acknowledged} -> {offset}")]
    OffsetRegression { acknowledged: u64, offset: u64 },

    #[error("declared size {declared} does not match payload size {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}
