use serde::{Deserialize, Serialize};
use shelfdrop_protocol::UploadHandle;

use crate::TransferError;
use crate::fingerprint::Fingerprint;

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Probing,
    Resuming,
    Initiating,
    Uploading,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// Returns `true` if `next` may follow `self`.
    ///
    /// Transitions only move forward, except for the
    /// `Uploading → Retrying → Uploading` loop. `Failed` and `Cancelled`
    /// are reachable from every non-terminal state.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed | Cancelled)
                | (Created, Probing)
                | (Probing, Resuming | Initiating)
                | (Resuming | Initiating, Uploading)
                | (Uploading, Uploading | Retrying | Completed)
                | (Retrying, Uploading)
        )
    }
}

/// One asset's transfer state.
///
/// Owned and mutated by a single driver; every mutation checks the
/// session invariants (`0 <= acknowledged <= total`, offsets never
/// decrease, transitions follow [`SessionState::can_transition_to`]).
#[derive(Debug, Clone)]
pub struct UploadSession {
    id: Fingerprint,
    endpoint: String,
    chunk_size: u64,
    total_bytes: u64,
    acknowledged: u64,
    state: SessionState,
    retries: u32,
    last_error: Option<String>,
    handle: Option<UploadHandle>,
}

impl UploadSession {
    /// Creates a session in the `Created` state.
    pub fn new(id: Fingerprint, endpoint: String, chunk_size: u64, total_bytes: u64) -> Self {
        Self {
            id,
            endpoint,
            chunk_size,
            total_bytes,
            acknowledged: 0,
            state: SessionState::Created,
            retries: 0,
            last_error: None,
            handle: None,
        }
    }

    /// Moves to `next`, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, next: SessionState) -> Result<(), TransferError> {
        if !self.state.can_transition_to(next) {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Records an offset confirmed by the endpoint.
    ///
    /// Returns `true` if the acknowledged offset advanced.
    pub fn acknowledge(&mut self, offset: u64) -> Result<bool, TransferError> {
        if offset > self.total_bytes {
            return Err(TransferError::OffsetOutOfRange {
                offset,
                total: self.total_bytes,
            });
        }
        if offset < self.acknowledged {
            return Err(TransferError::OffsetRegression {
                acknowledged: self.acknowledged,
                offset,
            });
        }
        let advanced = offset > self.acknowledged;
        self.acknowledged = offset;
        Ok(advanced)
    }

    /// Counts one consumed retry and remembers its cause.
    pub fn record_retry(&mut self, error: &str) {
        self.retries = self.retries.saturating_add(1);
        self.last_error = Some(error.to_string());
    }

    /// Marks the session as failed. No-op once terminal.
    pub fn fail(&mut self, error: &str) {
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::Failed;
        self.last_error = Some(error.to_string());
    }

    /// Marks the session as cancelled.
    ///
    /// Idempotent: returns `false` if the session was already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = SessionState::Cancelled;
        true
    }

    pub fn set_handle(&mut self, handle: UploadHandle) {
        self.handle = Some(handle);
    }

    pub fn handle(&self) -> Option<&UploadHandle> {
        self.handle.as_ref()
    }

    pub fn id(&self) -> &Fingerprint {
        &self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    pub fn remaining(&self) -> u64 {
        self.total_bytes - self.acknowledged
    }

    /// Returns `true` once every byte has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.acknowledged == self.total_bytes
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
