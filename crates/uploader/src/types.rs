//! Data types for the upload flow.

use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use shelfdrop_protocol::ErrorKind;
use shelfdrop_transfer::{Fingerprint, SessionState};

use crate::error::UploadError;

/// Event emitted while a batch is in flight.
///
/// `index` is the asset's position in the submitted batch.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The session moved to a new state.
    StateChanged {
        index: usize,
        session: Fingerprint,
        state: SessionState,
    },
    /// The endpoint acknowledged more bytes.
    Progress {
        index: usize,
        session: Fingerprint,
        bytes_acknowledged: u64,
        total_bytes: u64,
    },
    /// A retryable failure consumed a retry slot.
    Retrying {
        index: usize,
        session: Fingerprint,
        attempt: usize,
        delay: Duration,
        error: String,
    },
    /// The session reached its terminal result.
    Finished {
        index: usize,
        session: Fingerprint,
        result: UploadResult,
    },
}

impl UploadEvent {
    pub fn index(&self) -> usize {
        match self {
            UploadEvent::StateChanged { index, .. }
            | UploadEvent::Progress { index, .. }
            | UploadEvent::Retrying { index, .. }
            | UploadEvent::Finished { index, .. } => *index,
        }
    }

    /// Completion percentage for progress events, 0.0 to 100.0.
    ///
    /// A zero-length upload reports 100.
    pub fn percentage(&self) -> Option<f64> {
        match self {
            UploadEvent::Progress {
                bytes_acknowledged,
                total_bytes,
                ..
            } => Some(percentage(*bytes_acknowledged, *total_bytes)),
            _ => None,
        }
    }
}

/// Percentage of `total` covered by `acknowledged`.
pub fn percentage(acknowledged: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (acknowledged as f64 / total as f64) * 100.0
}

/// Terminal outcome of one asset.
///
/// Serializes as `{"ok":true,"publicAddress":..}` or
/// `{"ok":false,"errorKind":..,"message":..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    Uploaded { public_address: String },
    Failed { kind: ErrorKind, message: String },
}

impl UploadResult {
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        UploadResult::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(err: &UploadError) -> Self {
        Self::failed(err.kind(), err.to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, UploadResult::Uploaded { .. })
    }

    pub fn public_address(&self) -> Option<&str> {
        match self {
            UploadResult::Uploaded { public_address } => Some(public_address),
            UploadResult::Failed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            UploadResult::Uploaded { .. } => None,
            UploadResult::Failed { kind, .. } => Some(*kind),
        }
    }
}

impl Serialize for UploadResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UploadResult::Uploaded { public_address } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("publicAddress", public_address)?;
                map.end()
            }
            UploadResult::Failed { kind, message } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("errorKind", kind)?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}

/// Results of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    results: Vec<UploadResult>,
}

impl BatchResult {
    pub fn new(results: Vec<UploadResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&UploadResult> {
        self.results.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UploadResult> {
        self.results.iter()
    }

    pub fn into_inner(self) -> Vec<UploadResult> {
        self.results
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(UploadResult::is_ok)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_ok()).count()
    }

    /// Public addresses in input order, or `None` if any asset failed.
    ///
    /// A listing may only reference a complete image set.
    pub fn public_addresses(&self) -> Option<Vec<String>> {
        self.results
            .iter()
            .map(|r| r.public_address().map(str::to_string))
            .collect()
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a UploadResult;
    type IntoIter = std::slice::Iter<'a, UploadResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
