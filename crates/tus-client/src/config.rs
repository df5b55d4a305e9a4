//! Client configuration.

use std::fmt;
use std::time::Duration;

/// Default timeout applied to every HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for a [`TusClient`](crate::TusClient).
#[derive(Clone)]
pub struct TusConfig {
    /// Storage base URL, e.g. `https://<project>.supabase.co`.
    pub base_url: String,
    /// Bearer credential sent on every request.
    pub credential: String,
    /// Sends `x-upsert: true` on create so an existing object is replaced.
    pub upsert: bool,
    pub request_timeout: Duration,
}

impl TusConfig {
    pub fn new(base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: credential.into(),
            upsert: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for TusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TusConfig")
            .field("base_url", &self.base_url)
            .field("credential", &"<redacted>")
            .field("upsert", &self.upsert)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
