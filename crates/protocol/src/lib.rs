//! Wire types for the resumable upload protocol.
//!
//! Transport-free: header names, the `Upload-Metadata` codec, upload
//! handles and the error taxonomy shared by every other crate.

pub mod constants;
pub mod error;
pub mod metadata;
pub mod types;

// Re-export primary types for convenience.
pub use error::ProtocolError;
pub use metadata::UploadMetadata;
pub use types::{ErrorKind, ResumableUpload, UploadHandle};
