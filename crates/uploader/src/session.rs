//! Per-asset upload session.
//!
//! `SessionDriver` runs the probe → create/resume → chunk loop for one
//! asset and converts every outcome into an [`UploadResult`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shelfdrop_protocol::{ProtocolError, UploadHandle};
use shelfdrop_transfer::{Asset, Backoff, ChunkPlan, SessionState, UploadSession};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::UploaderConfig;
use crate::endpoint::ResumableEndpoint;
use crate::error::UploadError;
use crate::types::{UploadEvent, UploadResult};

/// Final state of a driven session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub state: SessionState,
    pub bytes_acknowledged: u64,
    pub total_bytes: u64,
    pub retries: u32,
    pub result: UploadResult,
}

/// Drives a single asset through its upload session.
pub struct SessionDriver {
    endpoint: Arc<dyn ResumableEndpoint>,
    config: Arc<UploaderConfig>,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<UploadEvent>>,
    index: usize,
}

impl SessionDriver {
    pub fn new(
        endpoint: Arc<dyn ResumableEndpoint>,
        config: Arc<UploaderConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            config,
            cancel,
            events: None,
            index: 0,
        }
    }

    /// Reports events for the asset at `index` on `events`.
    pub fn with_events(mut self, index: usize, events: mpsc::Sender<UploadEvent>) -> Self {
        self.index = index;
        self.events = Some(events);
        self
    }

    /// Runs the session to a terminal state.
    ///
    /// Never fails: errors, cancellation and exhausted retries all end up
    /// in the report's result.
    pub async fn run(&self, asset: &Asset) -> SessionReport {
        let mut session = UploadSession::new(
            asset.fingerprint(),
            self.endpoint.endpoint().to_string(),
            self.config.chunk_size,
            asset.size,
        );
        info!(
            session = %session.id(),
            source = %asset.source,
            object = %asset.object_name,
            bytes = asset.size,
            chunk_size = session.chunk_size(),
            endpoint = %session.endpoint(),
            "upload session started"
        );

        let result = match self.drive(asset, &mut session).await {
            Ok(public_address) => {
                info!(
                    session = %session.id(),
                    retries = session.retries(),
                    address = %public_address,
                    "upload completed"
                );
                UploadResult::Uploaded { public_address }
            }
            Err(UploadError::Cancelled) => {
                if session.cancel() {
                    self.emit_state(&session);
                }
                info!(
                    session = %session.id(),
                    acknowledged = session.acknowledged(),
                    "upload cancelled"
                );
                UploadResult::from_error(&UploadError::Cancelled)
            }
            Err(err) => {
                let message = err.to_string();
                session.fail(&message);
                self.emit_state(&session);
                error!(
                    session = %session.id(),
                    kind = %err.kind(),
                    location = ?session.handle().map(|h| h.location.as_str()),
                    error = %message,
                    "upload failed"
                );
                UploadResult::from_error(&err)
            }
        };

        self.emit(UploadEvent::Finished {
            index: self.index,
            session: session.id().clone(),
            result: result.clone(),
        });

        SessionReport {
            state: session.state(),
            bytes_acknowledged: session.acknowledged(),
            total_bytes: session.total_bytes(),
            retries: session.retries(),
            result,
        }
    }

    async fn drive(&self, asset: &Asset, session: &mut UploadSession) -> Result<String, UploadError> {
        self.check_cancelled()?;

        let metadata = asset.metadata(&self.config.cache_control);
        metadata.validate()?;
        asset.verify_size().await?;
        let plan = ChunkPlan::new(asset.size, self.config.chunk_size)?;

        let schedule = self.config.retry_schedule();
        let mut backoff = schedule.backoff();
        let fingerprint = session.id().clone();
        let endpoint = self.endpoint.as_ref();

        // 1. Probe for a prior transfer
        self.set_state(session, SessionState::Probing)?;
        let prior = self
            .cancellable(endpoint.find_resumable_upload(&fingerprint))
            .await?;

        // 2. Resume it, or create a new upload
        let handle = match prior {
            Some(prior) if prior.length == Some(asset.size) && prior.offset <= asset.size => {
                self.set_state(session, SessionState::Resuming)?;
                session.acknowledge(prior.offset)?;
                info!(
                    session = %fingerprint,
                    offset = prior.offset,
                    total = asset.size,
                    "resuming previous upload"
                );
                prior.handle
            }
            stale => {
                if let Some(stale) = stale {
                    warn!(
                        session = %fingerprint,
                        offset = stale.offset,
                        length = ?stale.length,
                        total = asset.size,
                        "discarding previous upload that does not match asset"
                    );
                    endpoint.forget(&fingerprint);
                }
                self.set_state(session, SessionState::Initiating)?;
                let (fp, meta) = (&fingerprint, &metadata);
                self.with_retry(session, &mut backoff, move || endpoint.create_upload(fp, meta))
                    .await?
            }
        };
        debug!(session = %fingerprint, location = %handle.location, "upload handle ready");
        session.set_handle(handle.clone());
        backoff.reset();

        // 3. Send chunks
        self.set_state(session, SessionState::Uploading)?;
        self.emit_progress(session);

        while !session.is_complete() {
            self.check_cancelled()?;

            let Some(range) = plan.range_at(session.acknowledged()) else {
                break;
            };
            let chunk = asset.payload.read_chunk(range).await?;
            let expected = chunk.end();
            trace!(
                session = %fingerprint,
                offset = chunk.offset,
                len = chunk.len(),
                remaining = session.remaining(),
                "sending chunk"
            );

            let outcome = match self.cancellable(endpoint.send_chunk(&handle, chunk)).await? {
                Ok(offset) if offset == expected => Ok(offset),
                Ok(offset) => Err(ProtocolError::Conflict(format!(
                    "endpoint acknowledged offset {offset}, expected {expected}"
                ))),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(offset) => {
                    session.acknowledge(offset)?;
                    backoff.reset();
                    self.emit_progress(session);
                }
                Err(err) if err.is_retryable() => {
                    self.recover(session, &handle, &mut backoff, err).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        // 4. Complete
        self.set_state(session, SessionState::Completed)?;
        endpoint.forget(&fingerprint);
        Ok(endpoint.public_url(&metadata))
    }

    /// Waits out the next backoff delay and re-reads the endpoint's
    /// offset, repeating while the re-read itself fails retryably.
    async fn recover(
        &self,
        session: &mut UploadSession,
        handle: &UploadHandle,
        backoff: &mut Backoff<'_>,
        mut last: ProtocolError,
    ) -> Result<(), UploadError> {
        self.set_state(session, SessionState::Retrying)?;

        loop {
            self.wait_for_retry(session, backoff, last).await?;

            match self.cancellable(self.endpoint.query_offset(handle)).await? {
                Ok(offset) => {
                    let advanced = session.acknowledge(offset)?;
                    debug!(session = %session.id(), offset, advanced, "offset re-synchronized");
                    self.set_state(session, SessionState::Uploading)?;
                    if advanced {
                        backoff.reset();
                        self.emit_progress(session);
                    }
                    return Ok(());
                }
                Err(err) if err.is_retryable() => last = err,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Repeats `op` while it fails retryably, up to the backoff limit.
    async fn with_retry<T, F, Fut>(
        &self,
        session: &mut UploadSession,
        backoff: &mut Backoff<'_>,
        mut op: F,
    ) -> Result<T, UploadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProtocolError>>,
    {
        loop {
            self.check_cancelled()?;
            match self.cancellable(op()).await? {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    self.wait_for_retry(session, backoff, err).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Consumes one retry slot and sleeps for its delay.
    async fn wait_for_retry(
        &self,
        session: &mut UploadSession,
        backoff: &mut Backoff<'_>,
        err: ProtocolError,
    ) -> Result<(), UploadError> {
        let Some(delay) = backoff.next_delay() else {
            return Err(UploadError::RetriesExhausted {
                retries: backoff.attempts(),
                last: err,
            });
        };

        let message = err.to_string();
        session.record_retry(&message);
        warn!(
            session = %session.id(),
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %message,
            "retrying after failure"
        );
        self.emit(UploadEvent::Retrying {
            index: self.index,
            session: session.id().clone(),
            attempt: backoff.attempts(),
            delay,
            error: message,
        });

        self.check_cancelled()?;
        self.sleep(delay).await
    }

    /// Awaits `fut` unless the session is cancelled first.
    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), UploadError> {
        if delay.is_zero() {
            return Ok(());
        }
        self.cancellable(tokio::time::sleep(delay)).await
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(())
    }

    fn set_state(&self, session: &mut UploadSession, next: SessionState) -> Result<(), UploadError> {
        let from = session.state();
        session.transition(next)?;
        debug!(session = %session.id(), ?from, to = ?next, "session state changed");
        self.emit_state(session);
        Ok(())
    }

    fn emit_state(&self, session: &UploadSession) {
        self.emit(UploadEvent::StateChanged {
            index: self.index,
            session: session.id().clone(),
            state: session.state(),
        });
    }

    fn emit_progress(&self, session: &UploadSession) {
        self.emit(UploadEvent::Progress {
            index: self.index,
            session: session.id().clone(),
            bytes_acknowledged: session.acknowledged(),
            total_bytes: session.total_bytes(),
        });
    }

    fn emit(&self, event: UploadEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        // Events never block the transfer; a full or closed channel drops them.
        if let Err(e) = tx.try_send(event) {
            trace!(index = self.index, error = %e, "upload event dropped");
        }
    }
}
