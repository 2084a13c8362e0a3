// Single owning task for the live snapshot. All reads and writes go through
// its command channel, so updates are applied one at a time and none is lost.
// Same-slot conflicts resolve by observation time: an update older than the
// value already in the slot is reported Stale and not written.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use super::{StoreError, UpdateOutcome, WriterLock, apply_update, snapshot_file};
use crate::models::{MetricVector, ParameterKind, Snapshot, StationId};

enum Command {
    Load {
        reply: oneshot::Sender<Snapshot>,
    },
    Get {
        station: StationId,
        reply: oneshot::Sender<Option<MetricVector>>,
    },
    Update {
        station: StationId,
        kind: ParameterKind,
        value: f64,
        observed_at: DateTime<Utc>,
        reply: oneshot::Sender<Result<UpdateOutcome, StoreError>>,
    },
}

pub struct StoreOwner {
    lock: WriterLock,
    snapshot: Snapshot,
    observed_at: HashMap<(StationId, ParameterKind), DateTime<Utc>>,
}

impl StoreOwner {
    /// Take over the snapshot currently on disk.
    pub fn open(lock: WriterLock) -> Result<Self, StoreError> {
        let snapshot = snapshot_file::load(lock.snapshot_path())?;
        Ok(Self::with_snapshot(lock, snapshot))
    }

    /// Start from a snapshot the caller just persisted (e.g. after bootstrap).
    pub fn with_snapshot(lock: WriterLock, snapshot: Snapshot) -> Self {
        Self {
            lock,
            snapshot,
            observed_at: HashMap::new(),
        }
    }

    /// Spawn the owner task. It exits once every handle is dropped and the
    /// queued commands are done; the lock is released then.
    pub fn spawn(self, capacity: usize) -> (StoreHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.run(rx));
        (StoreHandle { tx }, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        tracing::debug!(
            stations = self.snapshot.len(),
            path = %self.lock.snapshot_path().display(),
            "store owner started"
        );
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Load { reply } => {
                    let _ = reply.send(self.snapshot.clone());
                }
                Command::Get { station, reply } => {
                    let _ = reply.send(self.snapshot.get(&station).copied());
                }
                Command::Update {
                    station,
                    kind,
                    value,
                    observed_at,
                    reply,
                } => {
                    let result = self.update(station, kind, value, observed_at).await;
                    let _ = reply.send(result);
                }
            }
        }
        tracing::debug!(
            lock = %self.lock.lock_path().display(),
            "store owner shutting down"
        );
    }

    #[instrument(skip(self), fields(repo = "store", operation = "update"))]
    async fn update(
        &mut self,
        station: StationId,
        kind: ParameterKind,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<UpdateOutcome, StoreError> {
        let key = (station.clone(), kind);
        if let Some(last) = self.observed_at.get(&key)
            && observed_at < *last
        {
            return Ok(UpdateOutcome::Stale);
        }

        let previous = apply_update(&mut self.snapshot, &station, kind, value)?;

        if let Err(e) = self.persist().await {
            // Keep memory identical to what is on disk.
            if let Some(vector) = self.snapshot.get_mut(&station) {
                vector.set(kind, previous);
            }
            return Err(StoreError::Persist(Box::new(e)));
        }

        self.observed_at.insert(key, observed_at);
        Ok(UpdateOutcome::Applied { previous })
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let path = self.lock.snapshot_path().to_path_buf();
        let snapshot = self.snapshot.clone();
        tokio::task::spawn_blocking(move || snapshot_file::persist(&path, &snapshot))
            .await
            .map_err(|e| StoreError::Codec(format!("persist task join: {}", e)))?
    }
}

/// Cloneable handle to the store owner.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<Command>,
}

impl StoreHandle {
    pub async fn load(&self) -> Result<Snapshot, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Load { reply }).await?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    /// `Ok(None)` for a station that is not in the snapshot.
    pub async fn get(&self, station: &StationId) -> Result<Option<MetricVector>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Get {
            station: station.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    /// Returns once the new snapshot is durable (or the update was rejected).
    pub async fn update(
        &self,
        station: &StationId,
        kind: ParameterKind,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<UpdateOutcome, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Update {
            station: station.clone(),
            kind,
            value,
            observed_at,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    async fn send(&self, cmd: Command) -> Result<(), StoreError> {
        self.tx.send(cmd).await.map_err(|_| StoreError::Closed)
    }
}
