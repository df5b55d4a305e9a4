//! Content-type and object-name derivation for picked assets.

use std::path::Path;

use shelfdrop_protocol::constants::DEFAULT_CONTENT_TYPE;

/// Returns the trailing alphabetic extension of a uri (`photo.JPG` → `JPG`).
pub fn file_extension(uri: &str) -> Option<&str> {
    let (_, ext) = uri.rsplit_once('.')?;
    if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(ext)
    } else {
        None
    }
}

/// Guesses an image content type from a uri's extension.
///
/// `jpg` maps to `image/jpeg`; any other alphabetic extension to
/// `image/<ext>`. Without an extension the generic octet-stream type is used.
pub fn content_type_for(uri: &str) -> String {
    match file_extension(uri).map(str::to_ascii_lowercase).as_deref() {
        Some("jpg") => "image/jpeg".to_string(),
        Some(ext) => format!("image/{ext}"),
        None => DEFAULT_CONTENT_TYPE.to_string(),
    }
}

/// Last path segment of a uri or path, if it has one.
pub fn file_name(uri: &str) -> Option<&str> {
    let trimmed = uri.split(['?', '#']).next().unwrap_or(uri);
    Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
}

/// Object name for an upload: the file name, or the current UNIX time in
/// milliseconds when the source has none.
pub fn object_name_for(file_name: Option<&str>) -> String {
    match file_name {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => chrono::Utc::now().timestamp_millis().to_string(),
    }
}
