//! Upload session configuration.

use serde::{Deserialize, Serialize};
use shelfdrop_protocol::constants::DEFAULT_CACHE_CONTROL;
use shelfdrop_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_RETRY_DELAYS_MS, RetrySchedule, TransferError};

/// Default capacity of the coordinator's event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Settings shared by every session of a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploaderConfig {
    /// Bytes per chunk (default 6 MiB).
    pub chunk_size: u64,
    /// Backoff sequence between retries, in milliseconds.
    pub retry_delays_ms: Vec<u64>,
    /// Cache-Control metadata attached to created objects.
    pub cache_control: String,
    /// Capacity of the progress event channel.
    pub event_buffer: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_delays_ms: DEFAULT_RETRY_DELAYS_MS.to_vec(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl UploaderConfig {
    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_retry_delays_ms(mut self, delays: Vec<u64>) -> Self {
        self.retry_delays_ms = delays;
        self
    }

    pub fn retry_schedule(&self) -> RetrySchedule {
        RetrySchedule::from_millis(&self.retry_delays_ms)
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize(self.chunk_size));
        }
        Ok(())
    }
}
