//! Scripted in-memory endpoint shared by the session and coordinator tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::ops::Range;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use shelfdrop_protocol::{ProtocolError, ResumableUpload, UploadHandle, UploadMetadata};
use shelfdrop_transfer::{Chunk, Fingerprint};

use crate::endpoint::{EndpointFuture, ResumableEndpoint};

/// Scripted response to the next `send_chunk` call.
pub(crate) enum ChunkReply {
    /// Reject the chunk without applying it.
    Fail(ProtocolError),
    /// Apply the chunk, then lose the acknowledgement.
    ApplyThenFail(ProtocolError),
    /// Acknowledge a different offset without applying anything.
    Misreport(u64),
}

struct MockUpload {
    object_name: String,
    total: u64,
    data: Vec<u8>,
}

#[derive(Default)]
pub(crate) struct MockEndpoint {
    uploads: Mutex<HashMap<String, MockUpload>>,
    fingerprints: Mutex<HashMap<Fingerprint, String>>,
    create_failures: Mutex<VecDeque<ProtocolError>>,
    chunk_replies: Mutex<VecDeque<ChunkReply>>,
    offset_failures: Mutex<VecDeque<ProtocolError>>,
    rejected_objects: Mutex<HashMap<String, ProtocolError>>,
    hanging_objects: Mutex<HashSet<String>>,
    sent: Mutex<Vec<Range<u64>>>,
    forgotten: Mutex<Vec<Fingerprint>>,
    created: AtomicUsize,
}

impl MockEndpoint {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a partial upload of `prefix` that a probe for
    /// `fingerprint` will find.
    pub(crate) fn with_prior(
        self,
        fingerprint: Fingerprint,
        object_name: &str,
        total: u64,
        prefix: &[u8],
    ) -> Self {
        let location = format!("mock://uploads/prior-{}", fingerprint.as_str());
        self.uploads.lock().unwrap().insert(
            location.clone(),
            MockUpload {
                object_name: object_name.to_string(),
                total,
                data: prefix.to_vec(),
            },
        );
        self.fingerprints
            .lock()
            .unwrap()
            .insert(fingerprint, location);
        self
    }

    pub(crate) fn fail_creates(self, errors: Vec<ProtocolError>) -> Self {
        self.create_failures.lock().unwrap().extend(errors);
        self
    }

    pub(crate) fn script_chunks(self, replies: Vec<ChunkReply>) -> Self {
        self.chunk_replies.lock().unwrap().extend(replies);
        self
    }

    pub(crate) fn fail_offset_queries(self, errors: Vec<ProtocolError>) -> Self {
        self.offset_failures.lock().unwrap().extend(errors);
        self
    }

    /// Every create for `object_name` fails with `error`.
    pub(crate) fn reject_object(self, object_name: &str, error: ProtocolError) -> Self {
        self.rejected_objects
            .lock()
            .unwrap()
            .insert(object_name.to_string(), error);
        self
    }

    /// Chunks for `object_name` are never acknowledged.
    pub(crate) fn hang_object(self, object_name: &str) -> Self {
        self.hanging_objects
            .lock()
            .unwrap()
            .insert(object_name.to_string());
        self
    }

    pub(crate) fn sent_ranges(&self) -> Vec<Range<u64>> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn forgotten(&self) -> Vec<Fingerprint> {
        self.forgotten.lock().unwrap().clone()
    }

    /// Bytes stored for the upload of `object_name`.
    pub(crate) fn stored(&self, object_name: &str) -> Option<Vec<u8>> {
        self.uploads
            .lock()
            .unwrap()
            .values()
            .find(|u| u.object_name == object_name)
            .map(|u| u.data.clone())
    }

    fn apply(&self, handle: &UploadHandle, chunk: &Chunk) -> Result<u64, ProtocolError> {
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(&handle.location)
            .ok_or_else(|| ProtocolError::from_status(404, "unknown upload"))?;
        let offset = upload.data.len() as u64;
        if chunk.offset != offset {
            return Err(ProtocolError::from_status(409, format!("offset is {offset}")));
        }
        if chunk.end() > upload.total {
            return Err(ProtocolError::from_status(413, "exceeds declared length"));
        }
        upload.data.extend_from_slice(&chunk.data);
        Ok(upload.data.len() as u64)
    }

    fn is_hanging(&self, handle: &UploadHandle) -> bool {
        let object = self
            .uploads
            .lock()
            .unwrap()
            .get(&handle.location)
            .map(|u| u.object_name.clone());
        match object {
            Some(name) => self.hanging_objects.lock().unwrap().contains(&name),
            None => false,
        }
    }
}

impl ResumableEndpoint for MockEndpoint {
    fn endpoint(&self) -> &str {
        "mock://uploads"
    }

    fn create_upload<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
        metadata: &'a UploadMetadata,
    ) -> EndpointFuture<'a, UploadHandle> {
        Box::pin(async move {
            let rejected = self
                .rejected_objects
                .lock()
                .unwrap()
                .get(&metadata.object_name)
                .cloned();
            if let Some(err) = rejected {
                return Err(err);
            }
            let failure = self.create_failures.lock().unwrap().pop_front();
            if let Some(err) = failure {
                return Err(err);
            }

            let n = self.created.fetch_add(1, Ordering::SeqCst);
            let location = format!("mock://uploads/{n}");
            self.uploads.lock().unwrap().insert(
                location.clone(),
                MockUpload {
                    object_name: metadata.object_name.clone(),
                    total: metadata.total_length,
                    data: Vec::new(),
                },
            );
            self.fingerprints
                .lock()
                .unwrap()
                .insert(fingerprint.clone(), location.clone());
            Ok(UploadHandle::new(location))
        })
    }

    fn find_resumable_upload<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Option<ResumableUpload>> + Send + 'a>> {
        Box::pin(async move {
            let location = self.fingerprints.lock().unwrap().get(fingerprint).cloned()?;
            let (offset, length) = self
                .uploads
                .lock()
                .unwrap()
                .get(&location)
                .map(|u| (u.data.len() as u64, u.total))?;
            Some(ResumableUpload {
                handle: UploadHandle::new(location),
                offset,
                length: Some(length),
            })
        })
    }

    fn query_offset<'a>(&'a self, handle: &'a UploadHandle) -> EndpointFuture<'a, u64> {
        Box::pin(async move {
            let failure = self.offset_failures.lock().unwrap().pop_front();
            if let Some(err) = failure {
                return Err(err);
            }
            self.uploads
                .lock()
                .unwrap()
                .get(&handle.location)
                .map(|u| u.data.len() as u64)
                .ok_or_else(|| ProtocolError::from_status(404, "unknown upload"))
        })
    }

    fn send_chunk<'a>(&'a self, handle: &'a UploadHandle, chunk: Chunk) -> EndpointFuture<'a, u64> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(chunk.offset..chunk.end());
            if self.is_hanging(handle) {
                std::future::pending::<()>().await;
            }

            let reply = self.chunk_replies.lock().unwrap().pop_front();
            match reply {
                Some(ChunkReply::Fail(err)) => Err(err),
                Some(ChunkReply::ApplyThenFail(err)) => {
                    self.apply(handle, &chunk)?;
                    Err(err)
                }
                Some(ChunkReply::Misreport(offset)) => Ok(offset),
                None => self.apply(handle, &chunk),
            }
        })
    }

    fn public_url(&self, metadata: &UploadMetadata) -> String {
        format!(
            "https://storage.test/storage/v1/object/public/{}/{}",
            metadata.bucket_name, metadata.object_name
        )
    }

    fn forget(&self, fingerprint: &Fingerprint) {
        self.fingerprints.lock().unwrap().remove(fingerprint);
        self.forgotten.lock().unwrap().push(fingerprint.clone());
    }
}
