//! Asynchronous persistence gateway.
//!
//! The session controller hands every touched superset to the gateway and
//! moves on; writes are drained by one background task in submission order,
//! each running on the blocking pool. Because there is a single writer, two
//! writes for the same superset id are applied in the order the mutations
//! happened.
//!
//! Failed writes are not rolled back in memory. They are logged and
//! broadcast to `subscribe_failures` listeners.

use crate::store::SupersetStore;
use crate::{Error, Result, Superset};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

/// A single keyed write
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Insert(Superset),
    Update(Superset),
    Delete(Uuid),
}

impl WriteOp {
    pub fn superset_id(&self) -> Uuid {
        match self {
            WriteOp::Insert(s) | WriteOp::Update(s) => s.id(),
            WriteOp::Delete(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Insert(_) => "insert",
            WriteOp::Update(_) => "update",
            WriteOp::Delete(_) => "delete",
        }
    }

    fn apply(&self, store: &dyn SupersetStore) -> Result<()> {
        match self {
            WriteOp::Insert(s) => store.insert(s),
            WriteOp::Update(s) => store.update(s),
            WriteOp::Delete(id) => store.delete(*id),
        }
    }
}

/// A write that did not reach the store
#[derive(Clone, Debug, PartialEq)]
pub struct PersistenceFailure {
    pub superset_id: Uuid,
    pub operation: &'static str,
    pub message: String,
}

enum Command {
    Write(WriteOp),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer; cheap to clone
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn SupersetStore>,
    commands: mpsc::UnboundedSender<Command>,
    failures: broadcast::Sender<PersistenceFailure>,
}

impl PersistenceGateway {
    /// Start the writer task on the current Tokio runtime
    pub fn spawn(store: Arc<dyn SupersetStore>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(64);

        tokio::spawn(run_writer(store.clone(), rx, failures.clone()));

        Self {
            store,
            commands,
            failures,
        }
    }

    /// Queue a write without waiting for it
    pub fn submit(&self, op: WriteOp) {
        tracing::debug!("Queueing {} for superset {}", op.kind(), op.superset_id());
        if let Err(mpsc::error::SendError(Command::Write(op))) =
            self.commands.send(Command::Write(op))
        {
            report(
                &self.failures,
                PersistenceFailure {
                    superset_id: op.superset_id(),
                    operation: op.kind(),
                    message: "persistence writer is not running".into(),
                },
            );
        }
    }

    pub fn insert(&self, superset: Superset) {
        self.submit(WriteOp::Insert(superset));
    }

    pub fn update(&self, superset: Superset) {
        self.submit(WriteOp::Update(superset));
    }

    pub fn delete(&self, superset_id: Uuid) {
        self.submit(WriteOp::Delete(superset_id));
    }

    /// Wait until every write queued before this call has been applied
    pub async fn flush(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Command::Flush(done))
            .map_err(|_| Error::Persistence("persistence writer is not running".into()))?;
        wait.await
            .map_err(|_| Error::Persistence("persistence writer stopped during flush".into()))
    }

    /// All stored supersets, after pending writes have landed
    pub async fn get_all(&self) -> Result<Vec<Superset>> {
        self.flush().await?;
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.get_all())
            .await
            .map_err(|e| Error::Persistence(format!("store task failed: {}", e)))?
    }

    pub async fn size(&self) -> Result<usize> {
        self.flush().await?;
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.size())
            .await
            .map_err(|e| Error::Persistence(format!("store task failed: {}", e)))?
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<PersistenceFailure> {
        self.failures.subscribe()
    }
}

fn report(failures: &broadcast::Sender<PersistenceFailure>, failure: PersistenceFailure) {
    tracing::error!(
        "Persistence {} failed for superset {}: {}",
        failure.operation,
        failure.superset_id,
        failure.message
    );
    // No listeners is fine; the failure is already logged
    let _ = failures.send(failure);
}

async fn run_writer(
    store: Arc<dyn SupersetStore>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    failures: broadcast::Sender<PersistenceFailure>,
) {
    while let Some(command) = commands.recv().await {
        let op = match command {
            Command::Write(op) => op,
            Command::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let superset_id = op.superset_id();
        let operation = op.kind();
        let worker_store = store.clone();
        let outcome = tokio::task::spawn_blocking(move || op.apply(worker_store.as_ref())).await;

        let message = match outcome {
            Ok(Ok(())) => {
                tracing::debug!("Persisted {} for superset {}", operation, superset_id);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("store task failed: {}", e),
        };
        report(
            &failures,
            PersistenceFailure {
                superset_id,
                operation,
                message,
            },
        );
    }
    tracing::debug!("Persistence writer stopped");
}
