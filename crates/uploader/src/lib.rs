//! Resumable upload sessions and batch coordination.
//!
//! This crate drives uploads against any [`ResumableEndpoint`]; it has
//! no HTTP dependency of its own. `shelfdrop-tus` provides the tus
//! implementation used in production.
//!
//! # Pipeline (per asset)
//!
//! 1. **Probe**: look up a prior transfer by fingerprint
//! 2. **Resume / Create**: adopt its offset, or create a new upload
//! 3. **Upload**: send chunks sequentially, retrying with backoff
//! 4. **Complete**: resolve the object's public address
//!
//! [`UploadCoordinator`] runs one such session per asset concurrently and
//! settles every one of them before returning.

pub mod config;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-export primary types for convenience.
pub use config::UploaderConfig;
pub use coordinator::{BatchHandle, UploadCoordinator};
pub use endpoint::{EndpointFuture, ResumableEndpoint};
pub use error::UploadError;
pub use session::{SessionDriver, SessionReport};
pub use types::{BatchResult, UploadEvent, UploadResult};
