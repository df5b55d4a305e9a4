//! The resumable upload endpoint abstraction.
//!
//! `shelfdrop-tus` implements this over HTTP; tests use scripted mocks.
//! Keeping the session logic behind a trait makes it transport-free.

use std::future::Future;
use std::pin::Pin;

use shelfdrop_protocol::{ProtocolError, ResumableUpload, UploadHandle, UploadMetadata};
use shelfdrop_transfer::{Chunk, Fingerprint};

/// Boxed future returned by endpoint operations.
pub type EndpointFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProtocolError>> + Send + 'a>>;

/// A server that accepts resumable, chunked uploads.
pub trait ResumableEndpoint: Send + Sync {
    /// Address of the endpoint, recorded on every session.
    fn endpoint(&self) -> &str;

    /// Creates a new upload for `metadata` and remembers it under
    /// `fingerprint` so a later run can resume it.
    fn create_upload<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
        metadata: &'a UploadMetadata,
    ) -> EndpointFuture<'a, UploadHandle>;

    /// Looks up a prior upload for `fingerprint`.
    ///
    /// Never fails: any error while probing means there is nothing to
    /// resume.
    fn find_resumable_upload<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Option<ResumableUpload>> + Send + 'a>>;

    /// Bytes the endpoint has durably received for `handle`.
    fn query_offset<'a>(&'a self, handle: &'a UploadHandle) -> EndpointFuture<'a, u64>;

    /// Appends `chunk` at `chunk.offset` and returns the new offset.
    fn send_chunk<'a>(&'a self, handle: &'a UploadHandle, chunk: Chunk) -> EndpointFuture<'a, u64>;

    /// Public address of a completed object.
    fn public_url(&self, metadata: &UploadMetadata) -> String;

    /// Drops the resume record for `fingerprint` after a completed upload.
    fn forget(&self, fingerprint: &Fingerprint);
}
