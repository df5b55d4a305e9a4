//! tus HTTP client.
//!
//! Async client using `reqwest` with Bearer token authentication.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION};
use reqwest::{Method, RequestBuilder, Response, Url};
use shelfdrop_protocol::constants::{
    HEADER_TUS_RESUMABLE, HEADER_UPLOAD_LENGTH, HEADER_UPLOAD_METADATA, HEADER_UPLOAD_OFFSET,
    HEADER_UPSERT, OFFSET_OCTET_STREAM, PUBLIC_OBJECT_PATH, RESUMABLE_UPLOAD_PATH, TUS_VERSION,
};
use shelfdrop_protocol::{ProtocolError, ResumableUpload, UploadHandle, UploadMetadata};
use shelfdrop_transfer::{Chunk, Fingerprint};
use shelfdrop_uploader::{EndpointFuture, ResumableEndpoint};
use tracing::{debug, warn};

use crate::config::TusConfig;

/// Characters escaped in a public object path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// tus client for one storage endpoint.
///
/// Shared by every session of a batch. The only mutable state is the
/// fingerprint → upload URL store that backs resume probes; it lives for
/// the lifetime of the client and is not persisted.
pub struct TusClient {
    http: reqwest::Client,
    base_url: String,
    endpoint: Url,
    upsert: bool,
    uploads: Mutex<HashMap<Fingerprint, String>>,
}

impl TusClient {
    /// Creates a client. Fails with an auth error on an empty or
    /// unusable credential.
    pub fn new(config: TusConfig) -> Result<Self, ProtocolError> {
        let credential = config.credential.trim();
        if credential.is_empty() {
            return Err(ProtocolError::Auth("credential is empty".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {credential}"))
                .map_err(|_| ProtocolError::Auth("credential is not a valid header value".into()))?,
        );

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        let endpoint = Url::parse(&format!("{base_url}{RESUMABLE_UPLOAD_PATH}")).map_err(|e| {
            ProtocolError::Validation(format!("invalid base url {:?}: {e}", config.base_url))
        })?;

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProtocolError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            endpoint,
            upsert: config.upsert,
            uploads: Mutex::new(HashMap::new()),
        })
    }

    /// `POST` to the resumable endpoint.
    async fn create(&self, metadata: &UploadMetadata) -> Result<UploadHandle, ProtocolError> {
        let mut req = self
            .request(Method::POST, self.endpoint.as_str())
            .header(HEADER_UPLOAD_LENGTH, metadata.total_length)
            .header(HEADER_UPLOAD_METADATA, metadata.encode_header());
        if self.upsert {
            req = req.header(HEADER_UPSERT, "true");
        }

        let resp = send(req).await?;
        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ProtocolError::Server {
                status,
                body: "create response has no Location header".into(),
            })?;
        let url = self.endpoint.join(location).map_err(|e| ProtocolError::Server {
            status,
            body: format!("invalid Location {location:?}: {e}"),
        })?;

        debug!(
            object = %metadata.object_name,
            bytes = metadata.total_length,
            location = %url,
            "upload created"
        );
        Ok(UploadHandle::new(url.to_string()))
    }

    /// `HEAD` on the upload URL: acknowledged offset and declared length.
    async fn head(&self, handle: &UploadHandle) -> Result<(u64, Option<u64>), ProtocolError> {
        let resp = send(self.request(Method::HEAD, &handle.location)).await?;
        Ok((upload_offset(&resp)?, upload_length(&resp)))
    }

    /// `PATCH` one chunk at its offset.
    async fn patch(&self, handle: &UploadHandle, chunk: Chunk) -> Result<u64, ProtocolError> {
        let req = self
            .request(Method::PATCH, &handle.location)
            .header(HEADER_UPLOAD_OFFSET, chunk.offset)
            .header(CONTENT_TYPE, OFFSET_OCTET_STREAM)
            .body(chunk.data);
        let resp = send(req).await?;
        upload_offset(&resp)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(HEADER_TUS_RESUMABLE, TUS_VERSION)
    }

    fn store(&self) -> MutexGuard<'_, HashMap<Fingerprint, String>> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResumableEndpoint for TusClient {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn create_upload<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
        metadata: &'a UploadMetadata,
    ) -> EndpointFuture<'a, UploadHandle> {
        Box::pin(async move {
            let handle = self.create(metadata).await?;
            self.store()
                .insert(fingerprint.clone(), handle.location.clone());
            Ok(handle)
        })
    }

    fn find_resumable_upload<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Option<ResumableUpload>> + Send + 'a>> {
        Box::pin(async move {
            let location = self.store().get(fingerprint).cloned()?;
            let handle = UploadHandle::new(location);

            match self.head(&handle).await {
                Ok((offset, length)) => {
                    debug!(session = %fingerprint, offset, ?length, "found previous upload");
                    Some(ResumableUpload {
                        handle,
                        offset,
                        length,
                    })
                }
                Err(e) => {
                    warn!(session = %fingerprint, error = %e, "discarding stale upload record");
                    self.store().remove(fingerprint);
                    None
                }
            }
        })
    }

    fn query_offset<'a>(&'a self, handle: &'a UploadHandle) -> EndpointFuture<'a, u64> {
        Box::pin(async move { self.head(handle).await.map(|(offset, _)| offset) })
    }

    fn send_chunk<'a>(&'a self, handle: &'a UploadHandle, chunk: Chunk) -> EndpointFuture<'a, u64> {
        Box::pin(self.patch(handle, chunk))
    }

    fn public_url(&self, metadata: &UploadMetadata) -> String {
        let object = metadata
            .object_name
            .split('/')
            .map(|seg| utf8_percent_encode(seg, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}{PUBLIC_OBJECT_PATH}/{}/{object}",
            self.base_url,
            utf8_percent_encode(&metadata.bucket_name, PATH_SEGMENT)
        )
    }

    fn forget(&self, fingerprint: &Fingerprint) {
        self.store().remove(fingerprint);
    }
}

/// Sends a request, mapping transport failures and non-2xx statuses.
async fn send(req: RequestBuilder) -> Result<Response, ProtocolError> {
    let resp = req.send().await.map_err(transport_error)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProtocolError::from_status(status.as_u16(), body));
    }
    Ok(resp)
}

fn transport_error(e: reqwest::Error) -> ProtocolError {
    if e.is_builder() {
        ProtocolError::Validation(e.to_string())
    } else {
        ProtocolError::Network(e.to_string())
    }
}

fn upload_offset(resp: &Response) -> Result<u64, ProtocolError> {
    resp.headers()
        .get(HEADER_UPLOAD_OFFSET)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ProtocolError::Server {
            status: resp.status().as_u16(),
            body: "missing or invalid Upload-Offset header".into(),
        })
}

fn upload_length(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(HEADER_UPLOAD_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
