//! Protocol constants: tus headers and storage endpoint paths.

/// tus protocol version sent on every request.
pub const TUS_VERSION: &str = "1.0.0";

pub const HEADER_TUS_RESUMABLE: &str = "Tus-Resumable";
pub const HEADER_UPLOAD_LENGTH: &str = "Upload-Length";
pub const HEADER_UPLOAD_OFFSET: &str = "Upload-Offset";
pub const HEADER_UPLOAD_METADATA: &str = "Upload-Metadata";
pub const HEADER_UPSERT: &str = "x-upsert";

/// Content type required on chunk (PATCH) requests.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Path of the resumable upload endpoint, relative to the storage base URL.
pub const RESUMABLE_UPLOAD_PATH: &str = "/storage/v1/upload/resumable";

/// Path prefix of publicly readable objects, relative to the storage base URL.
pub const PUBLIC_OBJECT_PATH: &str = "/storage/v1/object/public";

/// Cache-Control metadata attached to created objects (seconds).
pub const DEFAULT_CACHE_CONTROL: &str = "3600";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// Metadata keys, in the order they are encoded.
pub const META_BUCKET_NAME: &str = "bucketName";
pub const META_OBJECT_NAME: &str = "objectName";
pub const META_CONTENT_TYPE: &str = "contentType";
pub const META_CACHE_CONTROL: &str = "cacheControl";
