//! Batch coordinator for concurrent uploads.
//!
//! Runs one session per asset in parallel, aggregates their events and
//! settles every session before returning, one result per asset in
//! input order.

use std::sync::Arc;

use shelfdrop_transfer::Asset;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::UploaderConfig;
use crate::endpoint::ResumableEndpoint;
use crate::error::UploadError;
use crate::session::SessionDriver;
use crate::types::{BatchResult, UploadEvent, UploadResult};

/// Coordinates concurrent uploads to one endpoint.
pub struct UploadCoordinator {
    endpoint: Arc<dyn ResumableEndpoint>,
    config: Arc<UploaderConfig>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadCoordinator {
    pub fn new(endpoint: Arc<dyn ResumableEndpoint>, config: UploaderConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        Self {
            endpoint,
            config: Arc::new(config),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Token that cancels every batch started by this coordinator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts one upload task per asset and returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_batch(&self, assets: Vec<Asset>) -> BatchHandle {
        info!(
            assets = assets.len(),
            endpoint = %self.endpoint.endpoint(),
            "starting upload batch"
        );

        let mut tasks = Vec::with_capacity(assets.len());
        let mut tokens = Vec::with_capacity(assets.len());
        for (index, asset) in assets.into_iter().enumerate() {
            let token = self.cancel.child_token();
            let driver = SessionDriver::new(self.endpoint.clone(), self.config.clone(), token.clone())
                .with_events(index, self.events_tx.clone());
            tasks.push(tokio::spawn(async move { driver.run(&asset).await.result }));
            tokens.push(token);
        }

        BatchHandle { tasks, tokens }
    }

    /// Uploads every asset concurrently and waits for all of them.
    ///
    /// A failing asset never affects the others.
    pub async fn submit_batch(&self, assets: Vec<Asset>) -> BatchResult {
        self.spawn_batch(assets).join().await
    }
}

/// A batch in flight.
pub struct BatchHandle {
    tasks: Vec<JoinHandle<UploadResult>>,
    tokens: Vec<CancellationToken>,
}

impl BatchHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancels the asset at `index`. Returns `false` if out of range.
    pub fn cancel(&self, index: usize) -> bool {
        match self.tokens.get(index) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for token in &self.tokens {
            token.cancel();
        }
    }

    /// Waits for every session to settle.
    pub async fn join(self) -> BatchResult {
        let mut results = Vec::with_capacity(self.tasks.len());
        for (index, task) in self.tasks.into_iter().enumerate() {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    error!(index, error = %e, "upload task failed");
                    UploadResult::from_error(&UploadError::Task(e.to_string()))
                }
            };
            results.push(result);
        }

        let batch = BatchResult::new(results);
        info!(
            assets = batch.len(),
            failed = batch.failed_count(),
            "upload batch settled"
        );
        batch
    }
}
