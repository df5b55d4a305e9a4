//! Upload metadata and its `Upload-Metadata` header encoding.
//!
//! tus encodes metadata as comma-separated `key base64(value)` pairs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::constants::{META_BUCKET_NAME, META_CACHE_CONTROL, META_CONTENT_TYPE, META_OBJECT_NAME};
use crate::error::ProtocolError;

/// Metadata registered with the endpoint when an upload is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub bucket_name: String,
    pub object_name: String,
    pub content_type: String,
    pub cache_control: String,
    /// Declared total length in bytes (sent as `Upload-Length`).
    pub total_length: u64,
}

impl UploadMetadata {
    /// Checks the fields the endpoint would otherwise reject.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.bucket_name.trim().is_empty() {
            return Err(ProtocolError::Validation("bucket name is empty".into()));
        }
        if self.object_name.trim().is_empty() {
            return Err(ProtocolError::Validation("object name is empty".into()));
        }
        if self.object_name.starts_with('/')
            || self.object_name.split('/').any(|seg| seg == "..")
        {
            return Err(ProtocolError::Validation(format!(
                "invalid object name: {}",
                self.object_name
            )));
        }
        match self.content_type.split_once('/') {
            Some((ty, sub)) if !ty.is_empty() && !sub.is_empty() => {}
            _ => {
                return Err(ProtocolError::Validation(format!(
                    "invalid content type: {:?}",
                    self.content_type
                )));
            }
        }
        Ok(())
    }

    /// Encodes the string fields as an `Upload-Metadata` header value.
    pub fn encode_header(&self) -> String {
        [
            (META_BUCKET_NAME, &self.bucket_name),
            (META_OBJECT_NAME, &self.object_name),
            (META_CONTENT_TYPE, &self.content_type),
            (META_CACHE_CONTROL, &self.cache_control),
        ]
        .iter()
        .map(|(key, value)| format!("{key} {}", STANDARD.encode(value.as_bytes())))
        .collect::<Vec<_>>()
        .join(",")
    }

    /// Parses an `Upload-Metadata` header plus the declared length.
    ///
    /// Missing `cacheControl` or `contentType` fall back to empty strings;
    /// bucket and object names are required.
    pub fn from_header(header: &str, total_length: u64) -> Result<Self, ProtocolError> {
        let pairs = decode_header(header)?;
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let bucket_name = get(META_BUCKET_NAME)
            .ok_or_else(|| ProtocolError::Validation("missing bucketName metadata".into()))?;
        let object_name = get(META_OBJECT_NAME)
            .ok_or_else(|| ProtocolError::Validation("missing objectName metadata".into()))?;

        Ok(Self {
            bucket_name,
            object_name,
            content_type: get(META_CONTENT_TYPE).unwrap_or_default(),
            cache_control: get(META_CACHE_CONTROL).unwrap_or_default(),
            total_length,
        })
    }
}

/// Decodes an `Upload-Metadata` header into `(key, value)` pairs.
///
/// A key without a value decodes to an empty string.
pub fn decode_header(header: &str) -> Result<Vec<(String, String)>, ProtocolError> {
    let mut pairs = Vec::new();
    for item in header.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, encoded) = match item.split_once(' ') {
            Some((k, v)) => (k, v.trim()),
            None => (item, ""),
        };
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| ProtocolError::Validation(format!("metadata {key}: {e}")))?;
        let value = String::from_utf8(raw)
            .map_err(|e| ProtocolError::Validation(format!("metadata {key}: {e}")))?;
        pairs.push((key.to_string(), value));
    }
    Ok(pairs)
}
