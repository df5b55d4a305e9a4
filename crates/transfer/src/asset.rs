use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shelfdrop_protocol::UploadMetadata;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::chunked::Chunk;
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::naming::{content_type_for, file_name, object_name_for};
use crate::TransferError;

/// Where an asset's bytes come from.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Bytes already in memory.
    Memory(Arc<[u8]>),
    /// A local file, read range by range.
    File(PathBuf),
}

impl Payload {
    /// Actual length of the payload in bytes.
    pub async fn len(&self) -> Result<u64, TransferError> {
        match self {
            Payload::Memory(bytes) => Ok(bytes.len() as u64),
            Payload::File(path) => Ok(tokio::fs::metadata(path).await?.len()),
        }
    }

    /// Reads the bytes in `range`.
    pub async fn read_chunk(&self, range: Range<u64>) -> Result<Chunk, TransferError> {
        let len = usize::try_from(range.end.saturating_sub(range.start)).map_err(|_| {
            TransferError::Io(std::io::Error::other("chunk does not fit in memory"))
        })?;
        let data = match self {
            Payload::Memory(bytes) => {
                let start = usize::try_from(range.start).unwrap_or(usize::MAX);
                bytes
                    .get(start..start.saturating_add(len))
                    .ok_or(TransferError::OffsetOutOfRange {
                        offset: range.end,
                        total: bytes.len() as u64,
                    })?
                    .to_vec()
            }
            Payload::File(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(std::io::SeekFrom::Start(range.start)).await?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).await?;
                buf
            }
        };
        Ok(Chunk {
            offset: range.start,
            data,
        })
    }
}

/// An immutable reference to a binary payload and its upload target.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Identity of the source (uri or name).
    pub source: String,
    /// Declared size in bytes.
    pub size: u64,
    pub content_type: String,
    pub bucket: String,
    pub object_name: String,
    pub payload: Payload,
}

impl Asset {
    /// Builds an asset from in-memory bytes.
    ///
    /// Content type and object name are derived from `source`.
    pub fn from_bytes(
        source: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        bucket: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            content_type: content_type_for(&source),
            object_name: object_name_for(file_name(&source)),
            size: bytes.len() as u64,
            bucket: bucket.into(),
            payload: Payload::Memory(bytes),
            source,
        }
    }

    /// Builds an asset from a local file, declaring its current size.
    pub async fn from_path(path: &Path, bucket: impl Into<String>) -> Result<Self, TransferError> {
        let size = tokio::fs::metadata(path).await?.len();
        let source = path.to_string_lossy().into_owned();
        Ok(Self {
            content_type: content_type_for(&source),
            object_name: object_name_for(file_name(&source)),
            size,
            bucket: bucket.into(),
            payload: Payload::File(path.to_path_buf()),
            source,
        })
    }

    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = name.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.source, &self.bucket, &self.object_name)
    }

    /// Metadata sent when creating the upload.
    pub fn metadata(&self, cache_control: &str) -> UploadMetadata {
        UploadMetadata {
            bucket_name: self.bucket.clone(),
            object_name: self.object_name.clone(),
            content_type: self.content_type.clone(),
            cache_control: cache_control.to_string(),
            total_length: self.size,
        }
    }

    /// Checks the declared size against the payload.
    pub async fn verify_size(&self) -> Result<(), TransferError> {
        let actual = self.payload.len().await?;
        if actual != self.size {
            return Err(TransferError::SizeMismatch {
                declared: self.size,
                actual,
            });
        }
        Ok(())
    }
}
