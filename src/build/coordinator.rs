//! Running store operations in the context that owns the document store
//!
//! [`DirectCoordinator`] runs a job on the caller's task. [`EventLoopCoordinator`]
//! hands it to a dedicated task and waits for completion, bounded by the commit
//! timeout and interruptible by cancellation. A job that has started always
//! runs to completion, so a document is never left half updated.

use super::cancel::CancelToken;
use super::store::DocumentStore;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Work executed against the store
pub type StoreJob = Box<dyn FnOnce(&mut dyn DocumentStore) + Send>;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Timed out after {0:?} waiting for the document store")]
    Timeout(Duration),

    #[error("Build cancelled")]
    Cancelled,

    #[error("Document store is no longer running")]
    Closed,

    #[error("{0}")]
    Store(String),
}

#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Runs `job` and waits until it has finished
    async fn submit(&self, job: StoreJob, cancel: &CancelToken) -> Result<(), CommitError>;
}

/// Runs `f` on the coordinator's store and returns its result
pub async fn on_store<T, F>(coordinator: &dyn Coordinator, cancel: &CancelToken, f: F) -> Result<T, CommitError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn DocumentStore) -> anyhow::Result<T> + Send + 'static,
{
    let (tx, mut rx) = oneshot::channel();
    coordinator
        .submit(
            Box::new(move |store| {
                let _ = tx.send(f(store));
            }),
            cancel,
        )
        .await?;
    match rx.try_recv() {
        Ok(result) => result.map_err(|e| CommitError::Store(format!("{:#}", e))),
        Err(_) => Err(CommitError::Closed),
    }
}

/// Applies jobs immediately on the calling task
pub struct DirectCoordinator {
    store: Mutex<Box<dyn DocumentStore>>,
}

impl DirectCoordinator {
    pub fn new(store: Box<dyn DocumentStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }
}

#[async_trait]
impl Coordinator for DirectCoordinator {
    async fn submit(&self, job: StoreJob, cancel: &CancelToken) -> Result<(), CommitError> {
        if cancel.is_cancelled() {
            return Err(CommitError::Cancelled);
        }
        let mut store = self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        job(store.as_mut());
        Ok(())
    }
}

type Envelope = (StoreJob, oneshot::Sender<()>);

/// Owns the store on a dedicated task and serializes all jobs through it
pub struct EventLoopCoordinator {
    sender: mpsc::Sender<Envelope>,
    timeout: Duration,
    handle: JoinHandle<()>,
}

impl EventLoopCoordinator {
    /// Must be called within a tokio runtime
    pub fn spawn(mut store: Box<dyn DocumentStore>, timeout: Duration) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(32);
        let handle = tokio::spawn(async move {
            while let Some((job, done)) = receiver.recv().await {
                job(store.as_mut());
                let _ = done.send(());
            }
            debug!("Document store loop finished");
        });
        Self {
            sender,
            timeout,
            handle,
        }
    }

    /// Stops accepting jobs and waits for queued ones to finish
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.handle.await {
            warn!("Document store loop failed: {}", e);
        }
    }
}

#[async_trait]
impl Coordinator for EventLoopCoordinator {
    async fn submit(&self, job: StoreJob, cancel: &CancelToken) -> Result<(), CommitError> {
        if cancel.is_cancelled() {
            return Err(CommitError::Cancelled);
        }
        let (done, finished) = oneshot::channel();
        self.sender
            .send((job, done))
            .await
            .map_err(|_| CommitError::Closed)?;

        tokio::select! {
            result = tokio::time::timeout(self.timeout, finished) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(CommitError::Closed),
                Err(_) => Err(CommitError::Timeout(self.timeout)),
            },
            _ = cancel.cancelled() => Err(CommitError::Cancelled),
        }
    }
}
